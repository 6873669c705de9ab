//! Registry of custom types the codec can rebuild.
//!
//! The registry is populated once at startup, before any value is encoded,
//! and is read-only afterwards. It is passed to [`Codec`](crate::Codec)
//! explicitly rather than living in a global.

use std::collections::HashMap;

use crate::error::{CodecError, Result};
use crate::value::{CustomType, CustomValue, Fields};

type Builder = fn(Fields) -> Result<CustomValue>;

#[derive(Debug, Clone)]
struct Registration {
    ignore: Vec<String>,
    build: Builder,
}

fn build<T: CustomType>(fields: Fields) -> Result<CustomValue> {
    T::from_fields(fields).map(CustomValue::new)
}

/// Name-keyed set of [`CustomType`]s with their ignored properties.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Registration>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under [`CustomType::NAME`].
    ///
    /// Properties listed in `ignore` are stripped before encoding, so they
    /// are never persisted and never handed back to [`CustomType::from_fields`].
    pub fn register<T: CustomType>(&mut self, ignore: &[&str]) -> Result<&mut Self> {
        if self.types.contains_key(T::NAME) {
            return Err(CodecError::DuplicateType(T::NAME.to_string()));
        }
        self.types.insert(
            T::NAME.to_string(),
            Registration {
                ignore: ignore.iter().map(|s| (*s).to_string()).collect(),
                build: build::<T>,
            },
        );
        Ok(self)
    }

    /// Returns whether a type is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Ignored properties of a registered type.
    pub(crate) fn ignored(&self, name: &str) -> Option<&[String]> {
        self.types.get(name).map(|r| r.ignore.as_slice())
    }

    /// Rebuilds an instance of the type registered under `name`.
    pub(crate) fn rebuild(&self, name: &str, mut fields: Fields) -> Result<CustomValue> {
        let registration = self
            .types
            .get(name)
            .ok_or_else(|| CodecError::UnregisteredType(name.to_string()))?;
        for ignored in &registration.ignore {
            fields.shift_remove(ignored);
        }
        (registration.build)(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[derive(Debug, PartialEq)]
    struct Counter {
        hits: i64,
    }

    impl CustomType for Counter {
        const NAME: &'static str = "Counter";

        fn to_fields(&self) -> Fields {
            let mut f = Fields::new();
            f.insert("hits".into(), Value::Int(self.hits));
            f
        }

        fn from_fields(fields: Fields) -> Result<Self> {
            let hits = fields
                .get("hits")
                .and_then(Value::as_i64)
                .ok_or_else(|| CodecError::InvalidFields {
                    type_name: Self::NAME.into(),
                    reason: "missing 'hits'".into(),
                })?;
            Ok(Self { hits })
        }
    }

    #[test]
    fn test_register_and_rebuild() {
        let mut registry = TypeRegistry::new();
        registry.register::<Counter>(&[]).unwrap();
        assert!(registry.contains("Counter"));

        let mut fields = Fields::new();
        fields.insert("hits".into(), Value::Int(3));
        let rebuilt = registry.rebuild("Counter", fields).unwrap();
        assert_eq!(rebuilt.downcast_ref::<Counter>(), Some(&Counter { hits: 3 }));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = TypeRegistry::new();
        registry.register::<Counter>(&[]).unwrap();
        let err = registry.register::<Counter>(&[]).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateType(name) if name == "Counter"));
    }

    #[test]
    fn test_rebuild_unregistered_fails() {
        let registry = TypeRegistry::new();
        let err = registry.rebuild("Nope", Fields::new()).unwrap_err();
        assert!(matches!(err, CodecError::UnregisteredType(_)));
    }
}
