//! Loading and saving the model snapshot file.

use std::path::Path;

use oxide_schema::snapshot::{parse_snapshot, render_snapshot, ModelSet};
use oxide_schema::SchemaError;
use tracing::{debug, warn};

use crate::error::Result;

/// Reads the last persisted model set.
///
/// A missing or unparseable file yields an empty set. A file written by an
/// unsupported format version is an error.
pub async fn load_snapshot(path: &Path) -> Result<ModelSet> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No model snapshot, starting empty");
            return Ok(ModelSet::new());
        }
    };

    match parse_snapshot(&text) {
        Ok(models) => Ok(models),
        Err(e @ SchemaError::UnsupportedSnapshotVersion(_)) => Err(e.into()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable model snapshot, starting empty");
            Ok(ModelSet::new())
        }
    }
}

/// Replaces the snapshot file with `models`.
pub async fn save_snapshot(path: &Path, models: &ModelSet) -> Result<()> {
    let text = render_snapshot(models)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    debug!(path = %path.display(), models = models.len(), "Model snapshot saved");
    Ok(())
}
