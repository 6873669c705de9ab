//! Error types for model declaration, DDL and statement building.

use oxide_codec::CodecError;

/// Errors raised while declaring models or building statements.
///
/// Everything except [`SchemaError::InvalidData`] and the codec errors it
/// wraps is a configuration error: it is raised while a model is declared or
/// a statement is built and is never worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A column type name is not one of the supported types.
    #[error("unknown column type '{0}'")]
    UnknownColumnType(String),

    /// A table, database or column name is not a plain identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// `auto_increment` was requested on a column that is not an integer.
    #[error("column '{column}' is {column_type} but auto increment requires integer")]
    AutoIncrementOnNonInteger {
        /// Column name.
        column: String,
        /// Declared type of the column.
        column_type: String,
    },

    /// More than one column was declared as primary key.
    #[error("table '{table}' declares both '{first}' and '{second}' as primary key")]
    DuplicatePrimaryKey {
        /// Table name.
        table: String,
        /// First primary key column.
        first: String,
        /// Second primary key column.
        second: String,
    },

    /// The live table's primary key differs from the declared one.
    #[error(
        "primary key of '{table}' is {} in the database but {} in the model; \
         this cannot be migrated automatically",
        .live.as_deref().unwrap_or("absent"),
        .declared.as_deref().unwrap_or("absent")
    )]
    PrimaryKeyConflict {
        /// Table name.
        table: String,
        /// Physical primary key column of the live table.
        live: Option<String>,
        /// Physical primary key column of the declared model.
        declared: Option<String>,
    },

    /// A column missing from the live table is NOT NULL without a default,
    /// so it cannot be added to existing rows.
    #[error("cannot add NOT NULL column '{column}' without a default to existing table '{table}'")]
    NotNullWithoutDefault {
        /// Table name.
        table: String,
        /// Logical column name.
        column: String,
    },

    /// An operation needs a primary key the model or row does not have.
    #[error("table '{0}' has no primary key value to address the row")]
    MissingPrimaryKey(String),

    /// An update was requested without any column besides the key.
    #[error("nothing to update in table '{0}'")]
    NothingToUpdate(String),

    /// A column override names a column the sample does not have and gives no type.
    #[error("cannot infer the type of column '{0}'; declare it explicitly")]
    UninferableColumn(String),

    /// A default value does not fit its column type.
    #[error("invalid default for column '{column}': {reason}")]
    InvalidDefault {
        /// Column name.
        column: String,
        /// Why the default was rejected.
        reason: String,
    },

    /// A value failed the column's runtime type check.
    #[error("invalid data for column '{column}': {reason}")]
    InvalidData {
        /// Column name.
        column: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The snapshot file carries a version this build cannot read.
    #[error("unsupported model snapshot version {0}")]
    UnsupportedSnapshotVersion(String),

    /// Value codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemaError {
    /// Returns `true` for errors caused by row data rather than configuration.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        match self {
            Self::InvalidData { .. } => true,
            Self::Codec(e) => !matches!(e, CodecError::DuplicateType(_)),
            _ => false,
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
