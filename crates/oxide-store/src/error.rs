//! Error types for the store.

use oxide_codec::CodecError;
use oxide_schema::SchemaError;

/// Errors that can occur while reconciling models or working with rows.
///
/// Use [`StoreError::is_configuration`], [`StoreError::is_data`] and
/// [`StoreError::is_not_found`] to tell the three kinds of failure apart.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Model, DDL or statement error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Value codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (snapshot or backup files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single-row lookup matched nothing.
    #[error("No row in '{table}' with key {key}")]
    NotFound {
        /// Table name.
        table: String,
        /// Rendered key value.
        key: String,
    },

    /// The key passed to a single-row lookup does not fit the primary key column.
    #[error("Invalid key for '{table}.{column}': expected {expected}, got {found}")]
    InvalidKey {
        /// Table name.
        table: String,
        /// Primary key column.
        column: String,
        /// Declared column type.
        expected: String,
        /// Kind of the supplied value.
        found: String,
    },

    /// No model was registered under this name.
    #[error("Model '{0}' is not registered")]
    UnregisteredModel(String),

    /// A model names a database that is neither main, temp, nor attached.
    #[error("Database '{0}' is not attached")]
    UnknownDatabase(String),

    /// The auxiliary database name is already in use.
    #[error("Database '{0}' is already attached")]
    DuplicateAttach(String),
}

impl StoreError {
    /// Errors raised while declaring or reconciling; never worth retrying.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        match self {
            Self::Schema(e) => !e.is_data_error(),
            Self::Codec(e) => matches!(e, CodecError::DuplicateType(_)),
            Self::UnregisteredModel(_) | Self::UnknownDatabase(_) | Self::DuplicateAttach(_) => {
                true
            }
            _ => false,
        }
    }

    /// Errors caused by a row value failing its column's type check.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        match self {
            Self::Schema(e) => e.is_data_error(),
            Self::Codec(e) => !matches!(e, CodecError::DuplicateType(_)),
            Self::InvalidKey { .. } => true,
            _ => false,
        }
    }

    /// Zero rows for a single-row fetch.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let conflict = StoreError::from(SchemaError::PrimaryKeyConflict {
            table: "t".into(),
            live: Some("uuid".into()),
            declared: Some("id".into()),
        });
        assert!(conflict.is_configuration());
        assert!(!conflict.is_data());

        let data = StoreError::from(SchemaError::InvalidData {
            column: "age".into(),
            reason: "expected integer".into(),
        });
        assert!(data.is_data());
        assert!(!data.is_configuration());

        let unregistered = StoreError::from(CodecError::UnregisteredType("Ghost".into()));
        assert!(unregistered.is_data());

        let missing = StoreError::NotFound {
            table: "t".into(),
            key: "1".into(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_configuration());

        assert!(StoreError::DuplicateAttach("aux".into()).is_configuration());
        assert!(StoreError::UnregisteredModel("Note".into()).is_configuration());
    }
}
