//! # oxide-codec
//!
//! Self-describing encoding that lets structured values share a single text
//! column and come back with their original shape.
//!
//! Scalars and arrays are stored as plain JSON. Objects, map-like
//! collections, byte buffers and registered application types are wrapped in
//! a `{"data": ..., "type": ...}` envelope:
//!
//! | value                      | envelope tag       |
//! |----------------------------|--------------------|
//! | [`Value::Object`]          | `object`           |
//! | [`Value::Map`]             | `Map`              |
//! | [`Value::Buffer`]          | `Buffer` (base64)  |
//! | registered [`CustomType`]  | `custom-<NAME>`    |
//!
//! ```
//! use oxide_codec::{Codec, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let codec = Codec::new(&registry);
//!
//! let value = Value::Map(vec![(Value::Int(1), Value::Text("one".into()))]);
//! let text = codec.to_text(&value).unwrap();
//! assert_eq!(text, r#"{"data":[[1,"one"]],"type":"Map"}"#);
//! assert_eq!(codec.from_text(&text, false).unwrap(), value);
//! ```
//!
//! Data written before envelopes existed can be read with `compat = true`,
//! which treats untagged objects as plain nested objects.

mod codec;
mod error;
mod registry;
mod value;

pub use codec::Codec;
pub use error::{CodecError, Result};
pub use registry::TypeRegistry;
pub use value::{CustomType, CustomValue, Fields, Value};
