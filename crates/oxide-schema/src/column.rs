//! Column types and their SQLite storage mapping.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use oxide_codec::{Codec, Value};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SchemaError};

/// Abstract column types a model can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// UTF-8 text.
    String,
    /// Finite floating point number.
    Number,
    /// Safe integer (exactly representable as a double).
    Integer,
    /// Boolean stored as `0`/`1`.
    Boolean,
    /// Any structured value, stored as codec envelope text.
    Json,
    /// Raw bytes.
    Blob,
}

impl ColumnType {
    /// Returns the SQLite storage type for this column type.
    #[must_use]
    pub const fn storage_type(self) -> StorageType {
        match self {
            Self::Boolean | Self::Integer => StorageType::Integer,
            Self::String | Self::Json => StorageType::Text,
            Self::Blob => StorageType::Blob,
            Self::Number => StorageType::Real,
        }
    }

    /// Returns the lowercase type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "json" => Ok(Self::Json),
            "blob" => Ok(Self::Blob),
            other => Err(SchemaError::UnknownColumnType(other.to_string())),
        }
    }
}

/// SQLite storage classes used in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// `INTEGER`
    Integer,
    /// `TEXT`
    Text,
    /// `BLOB`
    Blob,
    /// `REAL`
    Real,
}

impl StorageType {
    /// Returns the SQL type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Real => "REAL",
        }
    }

    /// Best guess of a column type for a live column the model does not declare.
    #[must_use]
    pub fn guess_column_type(declared: &str) -> ColumnType {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("INT") {
            ColumnType::Integer
        } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
            ColumnType::Number
        } else if declared.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::String
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a table model.
///
/// `name` is the logical name the application uses; `mapped_to`, when set, is
/// the physical column name in the database. Lookups crossing that boundary
/// must accept either (see [`Column::answers_to`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Logical column name.
    pub name: String,
    /// Physical column name, if different from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_to: Option<String>,
    /// Declared type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value rendered into DDL.
    ///
    /// A present `null` is a NULL default; only an absent key means none.
    #[serde(
        default,
        deserialize_with = "deserialize_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<Value>,
    /// Whether this column is the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Whether the engine generates this column's value.
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    /// Creates a NOT NULL column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            mapped_to: None,
            column_type,
            nullable: false,
            default_value: None,
            is_primary_key: false,
            auto_increment: false,
        }
    }

    /// Sets the physical column name.
    #[must_use]
    pub fn mapped_to(mut self, physical: impl Into<String>) -> Self {
        self.mapped_to = Some(physical.into());
        self
    }

    /// Allows NULL.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Marks the column as primary key. Primary keys are never NULL.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Lets the engine generate the value.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// The name used in SQL.
    #[must_use]
    pub fn physical_name(&self) -> &str {
        self.mapped_to.as_deref().unwrap_or(&self.name)
    }

    /// Whether `name` is this column's logical or physical name.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.mapped_to.as_deref() == Some(name)
    }

    /// Checks per-column invariants.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        if let Some(mapped) = &self.mapped_to {
            validate_identifier(mapped)?;
        }
        if self.auto_increment && self.column_type != ColumnType::Integer {
            return Err(SchemaError::AutoIncrementOnNonInteger {
                column: self.name.clone(),
                column_type: self.column_type.to_string(),
            });
        }
        Ok(())
    }

    /// Renders the DEFAULT literal, if the column has a default.
    pub fn default_literal(&self, codec: &Codec<'_>) -> Result<Option<String>> {
        self.default_value
            .as_ref()
            .map(|value| default_literal(self, value, codec))
            .transpose()
    }
}

/// Renders a default value as a DDL literal for `column`'s type.
///
/// String and blob defaults are emitted verbatim, without escaping. Defaults
/// are written by developers, never taken from user input; do not feed
/// untrusted text into a column default.
pub fn default_literal(column: &Column, value: &Value, codec: &Codec<'_>) -> Result<String> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        column: column.name.clone(),
        reason,
    };

    if value.is_null() {
        return Ok("NULL".to_string());
    }

    match (column.column_type, value) {
        (ColumnType::Boolean, Value::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
        (ColumnType::Boolean, Value::Int(i @ (0 | 1))) => Ok(i.to_string()),
        (ColumnType::Integer | ColumnType::Number, Value::Int(i)) => Ok(i.to_string()),
        (ColumnType::Integer | ColumnType::Number, Value::Float(f)) if f.is_finite() => {
            Ok(f.to_string())
        }
        (ColumnType::String, Value::Text(s)) => Ok(format!("'{s}'")),
        (ColumnType::Json, v) => Ok(format!("'{}'", codec.to_text(v)?)),
        (ColumnType::Blob, Value::Text(s)) => Ok(s.clone()),
        (ColumnType::Blob, Value::Buffer(bytes)) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            Ok(format!("X'{hex}'"))
        }
        (column_type, v) => Err(invalid(format!(
            "a {} value cannot default a {column_type} column",
            v.kind()
        ))),
    }
}

fn deserialize_default<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Rejects names that are not plain SQL identifiers.
pub fn validate_identifier(name: &str) -> Result<()> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

/// Quotes an identifier (table name, column name, etc.).
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
