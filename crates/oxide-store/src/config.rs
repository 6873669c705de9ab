//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// In-memory SQLite URL used when no database is configured.
pub const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Configuration for [`Store::open`](crate::Store::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx SQLite URL (`sqlite://app.db`, `sqlite::memory:`).
    pub database_url: String,
    /// Where the model snapshot is kept; no snapshot is read or written when unset.
    pub snapshot_path: Option<PathBuf>,
    /// Read untagged json payloads written before values were tagged.
    pub compat_mode: bool,
    /// Backup settings; backups are disabled when unset.
    pub backup: Option<BackupConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: MEMORY_DATABASE_URL.to_string(),
            snapshot_path: None,
            compat_mode: false,
            backup: None,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for an in-memory database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Sets the snapshot file.
    #[must_use]
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Enables compatibility decoding of json columns.
    #[must_use]
    pub const fn compat_mode(mut self, enabled: bool) -> Self {
        self.compat_mode = enabled;
        self
    }

    /// Enables backups.
    #[must_use]
    pub fn backup(mut self, backup: BackupConfig) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Whether the database lives only in memory.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// File name of the database, used to name backups.
    #[must_use]
    pub fn database_basename(&self) -> String {
        if self.is_memory() {
            return "memory.sqlite".to_string();
        }
        let path = self
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        Path::new(path)
            .file_name()
            .map_or_else(|| "database.sqlite".to_string(), |name| name.to_string_lossy().into_owned())
    }
}

/// Backup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory the backup files are written to.
    pub dir: PathBuf,
    /// How many periodic (`auto-`) backups to keep.
    pub max_periodic: usize,
    /// Seconds between periodic backups.
    pub interval_secs: u64,
    /// Commit hash embedded in backup file names.
    pub commit: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
            max_periodic: 10,
            interval_secs: 3600,
            commit: None,
        }
    }
}

impl BackupConfig {
    /// Creates backup settings writing to `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Sets how many periodic backups are kept.
    #[must_use]
    pub const fn max_periodic(mut self, max: usize) -> Self {
        self.max_periodic = max;
        self
    }

    /// Sets the periodic interval in seconds.
    #[must_use]
    pub const fn interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Sets the commit hash used in file names.
    #[must_use]
    pub fn commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// The periodic interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
