//! Model snapshot file format.
//!
//! The snapshot records every registered model as of the last run, so the
//! next run can tell which models changed:
//!
//! ```json
//! { "version": 1, "models": { "<model name>": { "tableName": ..., "database": ..., "columns": [...] } } }
//! ```
//!
//! Files written before versioning are a bare `{ "<model name>": model }`
//! mapping and are read as version 1.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Result, SchemaError};
use crate::model::TableModel;

/// The only snapshot version this crate reads and writes.
pub const SNAPSHOT_VERSION: u64 = 1;

/// Models keyed by model name, in registration order.
pub type ModelSet = IndexMap<String, TableModel>;

/// Versioned snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Format version.
    pub version: u64,
    /// Models keyed by name.
    pub models: ModelSet,
}

impl ModelSnapshot {
    /// Wraps a model set in a current-version snapshot.
    #[must_use]
    pub const fn new(models: ModelSet) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            models,
        }
    }
}

/// Reads a snapshot document.
///
/// Any version other than 1 is [`SchemaError::UnsupportedSnapshotVersion`].
/// Text that is not a snapshot at all is [`SchemaError::Serialization`].
pub fn parse_snapshot(text: &str) -> Result<ModelSet> {
    let mut json: Json = serde_json::from_str(text)?;

    let Some(version) = json.get("version").cloned() else {
        return Ok(serde_json::from_value(json)?);
    };
    if version.as_u64() != Some(SNAPSHOT_VERSION) {
        return Err(SchemaError::UnsupportedSnapshotVersion(version.to_string()));
    }

    let models = json
        .get_mut("models")
        .map(Json::take)
        .unwrap_or_else(|| Json::Object(serde_json::Map::new()));
    Ok(serde_json::from_value(models)?)
}

/// Writes a current-version snapshot as pretty-printed JSON.
///
/// Column defaults are written through an empty type registry, so a default
/// holding a registered custom type is written as a plain object.
pub fn render_snapshot(models: &ModelSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ModelSnapshot::new(models.clone()))?)
}
