//! Conversion between application values and stored column values.
//!
//! This is the runtime type check at the storage boundary: every value
//! written to or read from a column passes through [`Column::to_storage`] or
//! [`Column::from_storage`], and a value of the wrong shape is rejected with
//! [`SchemaError::InvalidData`] rather than coerced.

use oxide_codec::{Codec, Value};

use crate::column::{Column, ColumnType};
use crate::error::{Result, SchemaError};
use crate::param::SqlValue;

/// Largest integer a double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

const fn is_safe_integer(n: i64) -> bool {
    -MAX_SAFE_INTEGER <= n && n <= MAX_SAFE_INTEGER
}

// exact for safe integers
#[allow(clippy::cast_precision_loss)]
fn integer_to_number(n: i64) -> f64 {
    n as f64
}

/// Whether `value` may be used to look up a row by `column`.
///
/// NULL only passes for nullable columns, numeric columns reject non-finite
/// values, integers must be safe, booleans also accept their stored `0`/`1`
/// form, json accepts objects, maps and arrays, and blobs need a buffer.
#[must_use]
pub fn is_provided_type_valid(value: &Value, column: &Column) -> bool {
    match (column.column_type, value) {
        (_, Value::Null) => column.nullable,
        (ColumnType::Integer | ColumnType::Number, Value::Int(n)) => is_safe_integer(*n),
        (ColumnType::Boolean, Value::Bool(_) | Value::Int(0 | 1))
        | (ColumnType::String, Value::Text(_))
        | (ColumnType::Blob, Value::Buffer(_))
        | (
            ColumnType::Json,
            Value::Object(_) | Value::Array(_) | Value::Map(_) | Value::Custom(_),
        ) => true,
        (ColumnType::Number, Value::Float(f)) => f.is_finite(),
        _ => false,
    }
}

impl Column {
    fn invalid(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidData {
            column: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn mismatch(&self, found: &str) -> SchemaError {
        self.invalid(format!("expected {}, found {found}", self.column_type))
    }

    /// Converts an application value into the value stored in this column.
    ///
    /// `number` columns hold floats: an integer written to one is stored,
    /// and read back, as the equal [`Value::Float`].
    pub fn to_storage(&self, value: &Value, codec: &Codec<'_>) -> Result<SqlValue> {
        if value.is_null() {
            return if self.nullable {
                Ok(SqlValue::Null)
            } else {
                Err(self.invalid("null is not allowed"))
            };
        }

        match (self.column_type, value) {
            (ColumnType::Boolean, Value::Bool(b)) => Ok(SqlValue::Int(i64::from(*b))),
            (ColumnType::Boolean, Value::Int(n @ (0 | 1))) => Ok(SqlValue::Int(*n)),
            (ColumnType::Integer, Value::Int(n)) if is_safe_integer(*n) => Ok(SqlValue::Int(*n)),
            (ColumnType::Integer, Value::Int(n)) => {
                Err(self.invalid(format!("{n} is not a safe integer")))
            }
            (ColumnType::Number, Value::Int(n)) if is_safe_integer(*n) => {
                Ok(SqlValue::Float(integer_to_number(*n)))
            }
            (ColumnType::Number, Value::Int(n)) => {
                Err(self.invalid(format!("{n} cannot be stored exactly as a number")))
            }
            (ColumnType::Number, Value::Float(f)) if f.is_finite() => Ok(SqlValue::Float(*f)),
            (ColumnType::Number, Value::Float(f)) => {
                Err(self.invalid(format!("{f} is not a finite number")))
            }
            (ColumnType::String, Value::Text(s)) => Ok(SqlValue::Text(s.clone())),
            (ColumnType::Blob, Value::Buffer(bytes)) => Ok(SqlValue::Blob(bytes.clone())),
            (ColumnType::Json, v) => codec
                .to_text(v)
                .map(SqlValue::Text)
                .map_err(|e| self.invalid(e.to_string())),
            (_, v) => Err(self.mismatch(v.kind())),
        }
    }

    /// Converts a stored value back into an application value.
    ///
    /// `compat` is forwarded to the codec for json columns so untagged legacy
    /// payloads can still be read.
    pub fn from_storage(&self, raw: SqlValue, codec: &Codec<'_>, compat: bool) -> Result<Value> {
        if raw.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(self.invalid("null stored in a NOT NULL column"))
            };
        }

        match (self.column_type, raw) {
            (ColumnType::Boolean, SqlValue::Bool(b)) => Ok(Value::Bool(b)),
            (ColumnType::Boolean, SqlValue::Int(0)) => Ok(Value::Bool(false)),
            (ColumnType::Boolean, SqlValue::Int(1)) => Ok(Value::Bool(true)),
            (ColumnType::Integer, SqlValue::Int(n)) if is_safe_integer(n) => Ok(Value::Int(n)),
            (ColumnType::Integer, SqlValue::Int(n)) => {
                Err(self.invalid(format!("{n} is not a safe integer")))
            }
            (ColumnType::Number, SqlValue::Int(n)) => Ok(Value::Float(integer_to_number(n))),
            (ColumnType::Number, SqlValue::Float(f)) => Ok(Value::Float(f)),
            (ColumnType::String, SqlValue::Text(s)) => Ok(Value::Text(s)),
            (ColumnType::Blob, SqlValue::Blob(bytes)) => Ok(Value::Buffer(bytes)),
            (ColumnType::Json, SqlValue::Text(text)) => codec
                .from_text(&text, compat)
                .map_err(|e| self.invalid(e.to_string())),
            (_, other) => Err(self.mismatch(other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use oxide_codec::{CustomType, Fields, TypeRegistry};

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
    }

    impl CustomType for Point {
        const NAME: &'static str = "Point";

        fn to_fields(&self) -> Fields {
            let mut fields = Fields::new();
            fields.insert("x".into(), Value::Int(self.x));
            fields
        }

        fn from_fields(fields: Fields) -> oxide_codec::Result<Self> {
            Ok(Self {
                x: fields.get("x").and_then(Value::as_i64).unwrap_or_default(),
            })
        }
    }

    fn round_trip(column: &Column, value: Value) {
        let mut registry = TypeRegistry::new();
        registry.register::<Point>(&[]).unwrap();
        let codec = Codec::new(&registry);
        let stored = column.to_storage(&value, &codec).unwrap();
        assert_eq!(column.from_storage(stored, &codec, false).unwrap(), value);
    }

    #[test]
    fn test_round_trip_every_type() {
        round_trip(&Column::new("s", ColumnType::String), Value::from("hello"));
        round_trip(&Column::new("n", ColumnType::Number), Value::Float(2.5));
        round_trip(&Column::new("i", ColumnType::Integer), Value::Int(-7));
        round_trip(&Column::new("b", ColumnType::Boolean), Value::Bool(true));
        round_trip(&Column::new("b", ColumnType::Boolean), Value::Bool(false));
        round_trip(
            &Column::new("j", ColumnType::Json),
            Value::object([("a", Value::Int(1)), ("tags", Value::from(vec![Value::from("x")]))]),
        );
        round_trip(&Column::new("j", ColumnType::Json), Value::custom(Point { x: 4 }));
        round_trip(&Column::new("r", ColumnType::Blob), Value::Buffer(vec![0, 255, 9]));
        round_trip(&Column::new("s", ColumnType::String).nullable(), Value::Null);
        round_trip(&Column::new("j", ColumnType::Json).nullable(), Value::Null);
    }

    #[test]
    fn test_boolean_stored_as_integer() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("active", ColumnType::Boolean);
        assert_eq!(col.to_storage(&Value::Bool(true), &codec).unwrap(), SqlValue::Int(1));
        assert_eq!(col.to_storage(&Value::Int(0), &codec).unwrap(), SqlValue::Int(0));
        assert!(col.to_storage(&Value::Int(2), &codec).is_err());
    }

    #[test]
    fn test_wrong_shape_names_column() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("age", ColumnType::Integer);
        let err = col.to_storage(&Value::from("ten"), &codec).unwrap_err();
        assert!(matches!(&err, SchemaError::InvalidData { column, .. } if column == "age"));
        assert!(err.is_data_error());

        let err = col.to_storage(&Value::Null, &codec).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidData { .. }));

        let err = col.to_storage(&Value::Int(MAX_SAFE_INTEGER + 1), &codec).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidData { .. }));
    }

    #[test]
    fn test_number_column_holds_floats() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("score", ColumnType::Number);
        let stored = col.to_storage(&Value::Int(3), &codec).unwrap();
        assert_eq!(stored, SqlValue::Float(3.0));
        assert_eq!(col.from_storage(stored, &codec, false).unwrap(), Value::Float(3.0));
        assert_eq!(
            col.from_storage(SqlValue::Int(4), &codec, false).unwrap(),
            Value::Float(4.0)
        );
        assert!(col.to_storage(&Value::Int(MAX_SAFE_INTEGER + 1), &codec).is_err());
    }

    #[test]
    fn test_unsafe_stored_integer_rejected() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("count", ColumnType::Integer);
        let err = col
            .from_storage(SqlValue::Int(MAX_SAFE_INTEGER + 1), &codec, false)
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidData { reason, .. } if reason.ends_with("is not a safe integer")
        ));
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("ratio", ColumnType::Number);
        assert!(col.to_storage(&Value::Float(f64::NAN), &codec).is_err());
        assert!(col.to_storage(&Value::Float(f64::INFINITY), &codec).is_err());
    }

    #[test]
    fn test_malformed_json_is_data_error() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("meta", ColumnType::Json);
        let err = col
            .from_storage(SqlValue::Text("{not json".into()), &codec, false)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidData { .. }));

        let err = col
            .from_storage(
                SqlValue::Text(r#"{"data":{},"type":"custom-Ghost"}"#.into()),
                &codec,
                false,
            )
            .unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_compat_reads_untagged_json() {
        let registry = TypeRegistry::new();
        let codec = Codec::new(&registry);
        let col = Column::new("meta", ColumnType::Json);
        let legacy = SqlValue::Text(r#"{"a":1}"#.into());
        assert!(col.from_storage(legacy.clone(), &codec, false).is_err());
        assert_eq!(
            col.from_storage(legacy, &codec, true).unwrap(),
            Value::object([("a", Value::Int(1))])
        );
    }

    #[test]
    fn test_provided_type_validity() {
        let id = Column::new("id", ColumnType::Integer).primary_key();
        assert!(is_provided_type_valid(&Value::Int(1), &id));
        assert!(!is_provided_type_valid(&Value::Null, &id));
        assert!(!is_provided_type_valid(&Value::from("1"), &id));
        assert!(!is_provided_type_valid(&Value::Int(MAX_SAFE_INTEGER + 1), &id));

        let flag = Column::new("flag", ColumnType::Boolean);
        assert!(is_provided_type_valid(&Value::Int(1), &flag));
        assert!(!is_provided_type_valid(&Value::Int(3), &flag));

        let ratio = Column::new("ratio", ColumnType::Number);
        assert!(!is_provided_type_valid(&Value::Float(f64::NAN), &ratio));

        let meta = Column::new("meta", ColumnType::Json);
        assert!(is_provided_type_valid(&Value::from(vec![Value::Int(1)]), &meta));
        assert!(!is_provided_type_valid(&Value::Int(1), &meta));

        let raw = Column::new("raw", ColumnType::Blob);
        assert!(is_provided_type_valid(&Value::Buffer(vec![]), &raw));
        assert!(!is_provided_type_valid(&Value::from("abc"), &raw));
    }
}
