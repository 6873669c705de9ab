//! The in-memory value model.
//!
//! [`Value`] is a closed sum type with one variant per shape the codec knows
//! how to persist. Scalars map directly onto JSON; everything else travels
//! inside a tagged envelope (see [`crate::codec`]).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;

/// Insertion-ordered named fields of an object or custom value.
pub type Fields = IndexMap<String, Value>;

/// A structured value that can be stored in a single text column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Wide integer. It has no JSON representation and is never persisted.
    BigInt(i128),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Plain object with named fields.
    Object(Fields),
    /// Map-like collection whose keys need not be strings.
    Map(Vec<(Value, Value)>),
    /// Raw bytes.
    Buffer(Vec<u8>),
    /// Instance of an application type implementing [`CustomType`].
    Custom(CustomValue),
}

impl Value {
    /// Builds a [`Value::Object`] from `(name, value)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wraps a custom type instance.
    pub fn custom<T: CustomType>(value: T) -> Self {
        Self::Custom(CustomValue::new(value))
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for values that map onto a JSON scalar without an envelope.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Text(_)
        )
    }

    /// Returns `true` for the object-like shapes (object, array, map, buffer, custom).
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(
            self,
            Self::Array(_) | Self::Object(_) | Self::Map(_) | Self::Buffer(_) | Self::Custom(_)
        )
    }

    /// Returns `false` for kinds that have no serialized form.
    #[must_use]
    pub const fn is_serializable(&self) -> bool {
        !matches!(self, Self::BigInt(_))
    }

    /// Short human-readable name of the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::BigInt(_) => "bigint",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Map(_) => "map",
            Self::Buffer(_) => "buffer",
            Self::Custom(_) => "custom",
        }
    }

    /// Returns the text if this is a [`Value::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the named field of an object.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Object(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Self::Object(fields)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Capability implemented by application types that round-trip through the
/// codec under a stable registered name.
///
/// # Example
///
/// ```
/// use oxide_codec::{CustomType, Fields, Value};
///
/// #[derive(Debug, Default)]
/// struct Point { x: i64, y: i64 }
///
/// impl CustomType for Point {
///     const NAME: &'static str = "Point";
///
///     fn to_fields(&self) -> Fields {
///         let mut f = Fields::new();
///         f.insert("x".into(), Value::Int(self.x));
///         f.insert("y".into(), Value::Int(self.y));
///         f
///     }
///
///     fn from_fields(fields: Fields) -> oxide_codec::Result<Self> {
///         Ok(Point {
///             x: fields.get("x").and_then(Value::as_i64).unwrap_or_default(),
///             y: fields.get("y").and_then(Value::as_i64).unwrap_or_default(),
///         })
///     }
/// }
/// ```
pub trait CustomType: fmt::Debug + Send + Sync + 'static {
    /// Name the type is registered and tagged under (`custom-<NAME>`).
    const NAME: &'static str;

    /// Returns the instance's fields.
    fn to_fields(&self) -> Fields;

    /// Builds a fresh instance from decoded fields.
    fn from_fields(fields: Fields) -> Result<Self>
    where
        Self: Sized;
}

trait DynCustom: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn fields(&self) -> Fields;
    fn as_any(&self) -> &dyn Any;
}

impl<T: CustomType> DynCustom for T {
    fn type_name(&self) -> &'static str {
        T::NAME
    }

    fn fields(&self) -> Fields {
        self.to_fields()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased, cheaply clonable custom type instance.
#[derive(Debug, Clone)]
pub struct CustomValue(Arc<dyn DynCustom>);

impl CustomValue {
    /// Wraps an instance.
    pub fn new<T: CustomType>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Registered name of the wrapped type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Fields of the wrapped instance.
    #[must_use]
    pub fn fields(&self) -> Fields {
        self.0.fields()
    }

    /// Returns the concrete instance if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: CustomType>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.fields() == other.fields()
    }
}
