//! Error types for the value codec.

/// Errors raised while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value has no serialized form (e.g. a wide integer at top level).
    #[error("value of kind '{kind}' cannot be serialized")]
    NotSerializable {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// An object without a `type` tag was read outside compatibility mode.
    #[error("untagged object encountered outside compatibility mode")]
    Untagged,

    /// The envelope carries a tag that is neither builtin nor custom.
    #[error("unknown envelope tag '{0}'")]
    UnknownTag(String),

    /// The envelope names a custom type that was never registered.
    #[error("custom type '{0}' is not registered")]
    UnregisteredType(String),

    /// A custom type was registered twice under the same name.
    #[error("custom type '{0}' is already registered")]
    DuplicateType(String),

    /// The envelope payload does not match its tag.
    #[error("malformed '{tag}' envelope: {reason}")]
    Malformed {
        /// Envelope tag.
        tag: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// A custom type rejected the decoded fields.
    #[error("cannot rebuild '{type_name}': {reason}")]
    InvalidFields {
        /// Registered name of the custom type.
        type_name: String,
        /// Why the fields were rejected.
        reason: String,
    },

    /// JSON text could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
