//! Tagged envelope encoding.
//!
//! Scalars and arrays are written as bare JSON. Every other shape is wrapped
//! in `{"data": ..., "type": <tag>}` where the tag is one of `object`, `Map`,
//! `Buffer` or `custom-<Name>`, so the original shape can be rebuilt from a
//! single text value.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as Json};

use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::value::{Fields, Value};

const TAG_OBJECT: &str = "object";
const TAG_MAP: &str = "Map";
const TAG_BUFFER: &str = "Buffer";
const CUSTOM_PREFIX: &str = "custom-";

fn envelope(tag: &str, data: Json) -> Json {
    let mut map = JsonMap::new();
    map.insert("data".to_string(), data);
    map.insert("type".to_string(), Json::String(tag.to_string()));
    Json::Object(map)
}

fn malformed(tag: &str, reason: impl Into<String>) -> CodecError {
    CodecError::Malformed {
        tag: tag.to_string(),
        reason: reason.into(),
    }
}

/// Encodes and decodes [`Value`]s against a [`TypeRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Codec<'r> {
    /// Creates a codec reading custom types from `registry`.
    #[must_use]
    pub const fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry this codec resolves custom tags against.
    #[must_use]
    pub const fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Converts a value into its JSON-safe tree.
    ///
    /// Unserializable elements nested in arrays, objects or maps are dropped;
    /// an unserializable value at the top level is an error.
    pub fn serialize(&self, value: &Value) -> Result<Json> {
        self.encode(value)
            .ok_or(CodecError::NotSerializable { kind: value.kind() })
    }

    /// Rebuilds a value from its JSON-safe tree.
    ///
    /// With `compat` set, objects without a `type` tag are accepted and read
    /// as plain nested objects. This only exists for data written before
    /// values were tagged.
    pub fn deserialize(&self, json: &Json, compat: bool) -> Result<Value> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null)),
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Array(items) => items
                .iter()
                .map(|item| self.deserialize(item, compat))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Json::Object(map) => self.decode_object(map, compat),
        }
    }

    /// Serializes a value straight to JSON text.
    pub fn to_text(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize(value)?)?)
    }

    /// Parses JSON text and deserializes it.
    pub fn from_text(&self, text: &str, compat: bool) -> Result<Value> {
        let json: Json = serde_json::from_str(text)?;
        self.deserialize(&json, compat)
    }

    fn encode(&self, value: &Value) -> Option<Json> {
        match value {
            Value::Null => Some(Json::Null),
            Value::Bool(b) => Some(Json::Bool(*b)),
            Value::Int(i) => Some(Json::from(*i)),
            // JSON has no NaN or infinity
            Value::Float(f) => Some(serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number)),
            Value::Text(s) => Some(Json::String(s.clone())),
            Value::BigInt(_) => None,
            Value::Array(items) => Some(Json::Array(
                items.iter().filter_map(|item| self.encode(item)).collect(),
            )),
            Value::Object(fields) => Some(envelope(TAG_OBJECT, self.encode_fields(fields, &[]))),
            Value::Map(entries) => {
                let pairs = entries
                    .iter()
                    .filter_map(|(k, v)| Some(Json::Array(vec![self.encode(k)?, self.encode(v)?])))
                    .collect();
                Some(envelope(TAG_MAP, Json::Array(pairs)))
            }
            Value::Buffer(bytes) => Some(envelope(TAG_BUFFER, Json::String(BASE64.encode(bytes)))),
            Value::Custom(custom) => {
                let fields = custom.fields();
                match self.registry.ignored(custom.type_name()) {
                    Some(ignore) => Some(envelope(
                        &format!("{CUSTOM_PREFIX}{}", custom.type_name()),
                        self.encode_fields(&fields, ignore),
                    )),
                    None => Some(envelope(TAG_OBJECT, self.encode_fields(&fields, &[]))),
                }
            }
        }
    }

    fn encode_fields(&self, fields: &Fields, ignore: &[String]) -> Json {
        let mut map = JsonMap::new();
        for (name, value) in fields {
            if ignore.contains(name) {
                continue;
            }
            if let Some(json) = self.encode(value) {
                map.insert(name.clone(), json);
            }
        }
        Json::Object(map)
    }

    fn decode_object(&self, map: &JsonMap<String, Json>, compat: bool) -> Result<Value> {
        let tag = map.get("type").and_then(Json::as_str);
        let (Some(tag), Some(data)) = (tag, map.get("data")) else {
            if compat {
                return self.decode_plain(map, compat);
            }
            return Err(CodecError::Untagged);
        };

        match tag {
            TAG_OBJECT => self.decode_fields(tag, data, compat).map(Value::Object),
            TAG_MAP => self.decode_map(data, compat),
            TAG_BUFFER => decode_buffer(data),
            _ => {
                if let Some(name) = tag.strip_prefix(CUSTOM_PREFIX) {
                    if !self.registry.contains(name) {
                        return Err(CodecError::UnregisteredType(name.to_string()));
                    }
                    let fields = self.decode_fields(tag, data, compat)?;
                    return self.registry.rebuild(name, fields).map(Value::Custom);
                }
                if compat {
                    self.decode_plain(map, compat)
                } else {
                    Err(CodecError::UnknownTag(tag.to_string()))
                }
            }
        }
    }

    fn decode_plain(&self, map: &JsonMap<String, Json>, compat: bool) -> Result<Value> {
        let mut fields = Fields::new();
        for (name, json) in map {
            fields.insert(name.clone(), self.deserialize(json, compat)?);
        }
        Ok(Value::Object(fields))
    }

    fn decode_fields(&self, tag: &str, data: &Json, compat: bool) -> Result<Fields> {
        let Json::Object(map) = data else {
            return Err(malformed(tag, "data is not an object"));
        };
        let mut fields = Fields::new();
        for (name, json) in map {
            fields.insert(name.clone(), self.deserialize(json, compat)?);
        }
        Ok(fields)
    }

    fn decode_map(&self, data: &Json, compat: bool) -> Result<Value> {
        let Json::Array(pairs) = data else {
            return Err(malformed(TAG_MAP, "data is not a list of entries"));
        };
        let mut entries = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match pair {
                Json::Array(kv) if kv.len() == 2 => entries.push((
                    self.deserialize(&kv[0], compat)?,
                    self.deserialize(&kv[1], compat)?,
                )),
                _ => return Err(malformed(TAG_MAP, "entry is not a [key, value] pair")),
            }
        }
        Ok(Value::Map(entries))
    }
}

/// Buffers are base64 text. The byte-array form `[1, 2, 3]` is also read.
fn decode_buffer(data: &Json) -> Result<Value> {
    match data {
        Json::String(encoded) => BASE64
            .decode(encoded)
            .map(Value::Buffer)
            .map_err(|e| malformed(TAG_BUFFER, e.to_string())),
        Json::Array(bytes) => bytes
            .iter()
            .map(|b| {
                b.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| malformed(TAG_BUFFER, "byte out of range"))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Value::Buffer),
        _ => Err(malformed(TAG_BUFFER, "data is neither base64 text nor bytes")),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let registry = TypeRegistry::new();
        Codec::new(&registry)
            .serialize(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        let registry = TypeRegistry::new();
        Codec::new(&registry)
            .deserialize(&json, true)
            .map_err(serde::de::Error::custom)
    }
}
