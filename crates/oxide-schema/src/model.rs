//! Table models and their declaration.
//!
//! A [`TableModel`] is never built up incrementally by the application.
//! Instead a [`ModelDeclaration`] collects a sample instance and explicit
//! column overrides, and [`declare_model`] turns it into a model in one pure
//! step.

use oxide_codec::{Fields, Value};
use serde::{Deserialize, Serialize};

use crate::column::{quote_identifier, validate_identifier, Column, ColumnType};
use crate::error::{Result, SchemaError};

/// Database every model lives in unless told otherwise.
pub const MAIN_DATABASE: &str = "main";

/// Name of the primary key added to models that do not declare one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

fn main_database() -> String {
    MAIN_DATABASE.to_string()
}

/// Complete description of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableModel {
    /// Table name.
    pub table_name: String,
    /// Owning database (`main`, `temp` or an attached name).
    #[serde(default = "main_database")]
    pub database: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
}

impl TableModel {
    /// Creates an empty model in the main database.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            database: main_database(),
            columns: Vec::new(),
        }
    }

    /// Sets the owning database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Returns the primary key column, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    /// Looks up a column by logical or physical name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.answers_to(name))
    }

    /// Quoted `"database"."table"` reference.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.database),
            quote_identifier(&self.table_name)
        )
    }

    /// Checks identifiers, column invariants and the single primary key rule.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table_name)?;
        validate_identifier(&self.database)?;

        let mut primary: Option<&Column> = None;
        for column in &self.columns {
            column.validate()?;
            if !column.is_primary_key {
                continue;
            }
            if let Some(first) = primary {
                return Err(SchemaError::DuplicatePrimaryKey {
                    table: self.table_name.clone(),
                    first: first.name.clone(),
                    second: column.name.clone(),
                });
            }
            primary = Some(column);
        }
        Ok(())
    }
}

/// Explicit overrides for one column.
///
/// Anything left unset falls back to what the sample instance implies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSpec {
    /// Logical name.
    pub name: String,
    /// Physical name.
    pub mapped_to: Option<String>,
    /// Explicit type.
    pub column_type: Option<ColumnType>,
    /// Explicit nullability.
    pub nullable: Option<bool>,
    /// Explicit default.
    pub default: Option<Value>,
    /// Marks the primary key.
    pub primary_key: bool,
    /// Engine-generated value.
    pub auto_increment: bool,
}

impl ColumnSpec {
    /// Creates an override for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..<Self as Default>::default()
        }
    }

    /// Sets the physical name.
    #[must_use]
    pub fn mapped_to(mut self, physical: impl Into<String>) -> Self {
        self.mapped_to = Some(physical.into());
        self
    }

    /// Sets the type.
    #[must_use]
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the default.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Lets the engine generate the value.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Everything needed to declare one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDeclaration {
    /// Model identifier, the key in the snapshot.
    pub name: String,
    /// Table name; defaults to `name`.
    pub table_name: Option<String>,
    /// Owning database.
    pub database: String,
    /// Representative instance used to infer columns.
    pub sample: Fields,
    /// Explicit column overrides.
    pub columns: Vec<ColumnSpec>,
}

impl ModelDeclaration {
    /// Starts a declaration for model `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            database: main_database(),
            sample: Fields::new(),
            columns: Vec::new(),
        }
    }

    /// Sets the table name.
    #[must_use]
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Sets the owning database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Adds one property of the sample instance.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sample.insert(name.into(), value.into());
        self
    }

    /// Replaces the sample instance.
    #[must_use]
    pub fn sample(mut self, sample: Fields) -> Self {
        self.sample = sample;
        self
    }

    /// Adds a column override.
    #[must_use]
    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    /// The table name in effect.
    #[must_use]
    pub fn effective_table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.name)
    }
}

/// Best-effort column type for a sample value.
///
/// Returns `None` for values with no stored form; those columns need an
/// explicit type.
#[must_use]
pub const fn infer_column_type(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Bool(_) => Some(ColumnType::Boolean),
        Value::Int(_) => Some(ColumnType::Integer),
        Value::Float(_) => Some(ColumnType::Number),
        Value::Text(_) => Some(ColumnType::String),
        Value::Buffer(_) => Some(ColumnType::Blob),
        Value::Null | Value::Array(_) | Value::Object(_) | Value::Map(_) | Value::Custom(_) => {
            Some(ColumnType::Json)
        }
        Value::BigInt(_) => None,
    }
}

fn build_column(name: &str, sample: Option<&Value>, spec: Option<&ColumnSpec>) -> Result<Column> {
    let column_type = spec
        .and_then(|s| s.column_type)
        .or_else(|| sample.and_then(infer_column_type))
        .ok_or_else(|| SchemaError::UninferableColumn(name.to_string()))?;

    let auto_increment = spec.is_some_and(|s| s.auto_increment);
    let explicit_default = spec.and_then(|s| s.default.clone());
    let default_value = if auto_increment {
        explicit_default
    } else {
        explicit_default.or_else(|| sample.cloned())
    };

    let mut column = Column::new(name, column_type);
    column.mapped_to = spec.and_then(|s| s.mapped_to.clone());
    column.nullable = spec
        .and_then(|s| s.nullable)
        .unwrap_or_else(|| sample.is_some_and(Value::is_null));
    column.default_value = default_value;
    column.auto_increment = auto_increment;
    if spec.is_some_and(|s| s.primary_key) {
        column = column.primary_key();
    }
    Ok(column)
}

/// Builds a [`TableModel`] from a declaration.
///
/// Columns come from the sample in property order, followed by overrides
/// that name properties the sample lacks. When no primary key is declared an
/// `id` column is promoted (or prepended) as an auto-incrementing integer key.
pub fn declare_model(declaration: &ModelDeclaration) -> Result<TableModel> {
    let spec_for = |name: &str| declaration.columns.iter().find(|s| s.name == name);

    let mut columns = Vec::with_capacity(declaration.sample.len() + 1);
    for (name, value) in &declaration.sample {
        columns.push(build_column(name, Some(value), spec_for(name))?);
    }
    for spec in &declaration.columns {
        if !declaration.sample.contains_key(&spec.name) {
            columns.push(build_column(&spec.name, None, Some(spec))?);
        }
    }

    if !columns.iter().any(|c| c.is_primary_key) {
        match columns.iter_mut().find(|c| c.name == DEFAULT_PRIMARY_KEY) {
            Some(id) => {
                id.column_type = ColumnType::Integer;
                id.default_value = None;
                id.is_primary_key = true;
                id.auto_increment = true;
                id.nullable = false;
            }
            None => columns.insert(
                0,
                Column::new(DEFAULT_PRIMARY_KEY, ColumnType::Integer)
                    .primary_key()
                    .auto_increment(),
            ),
        }
    }

    let model = TableModel {
        table_name: declaration.effective_table_name().to_string(),
        database: declaration.database.clone(),
        columns,
    };
    model.validate()?;
    Ok(model)
}
