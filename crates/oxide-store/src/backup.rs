//! Database backups with rotation of periodic copies.
//!
//! Backups are full copies taken with `VACUUM INTO` on the store's own
//! connection. Files are named
//! `<trigger>-<timestamp>[-<commit>]-<database file name>`, for example
//! `auto-20240301T120000.000Z-3f2a91c-app.db`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::BackupConfig;
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Why a backup is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupTrigger {
    /// Timer-driven; skipped when no rows changed since the last backup.
    Periodic,
    /// Requested by the application.
    Manual,
    /// A model registration changed the schema.
    Structural,
}

impl BackupTrigger {
    /// File name prefix for this trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "auto",
            Self::Manual => "manual",
            Self::Structural => "structural",
        }
    }
}

/// Result of a backup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A backup file was written.
    Created(PathBuf),
    /// Nothing was written: no changes for a periodic backup, or another
    /// backup was still running.
    Skipped,
}

/// Builds the backup file name for `trigger` at `at`.
#[must_use]
pub fn backup_file_name(
    trigger: BackupTrigger,
    at: DateTime<Utc>,
    commit: Option<&str>,
    basename: &str,
) -> String {
    let timestamp = at.format(TIMESTAMP_FORMAT);
    match commit {
        Some(commit) => format!("{}-{timestamp}-{commit}-{basename}", trigger.as_str()),
        None => format!("{}-{timestamp}-{basename}", trigger.as_str()),
    }
}

/// Timestamp embedded in a backup file name made by [`backup_file_name`].
#[must_use]
pub fn parse_backup_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let (_, rest) = file_name.split_once('-')?;
    let stamp = rest.split('-').next()?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Clears the in-progress flag when a backup finishes, however it finishes.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Takes and rotates backups of the store's main database.
#[derive(Debug)]
pub struct BackupManager {
    pool: SqlitePool,
    config: BackupConfig,
    basename: String,
    changes: Arc<AtomicU64>,
    changes_at_last_backup: AtomicU64,
    in_progress: AtomicBool,
}

impl BackupManager {
    /// Creates a manager backing up the database behind `pool`.
    ///
    /// `changes` is the store's row-change counter; periodic backups are
    /// skipped while it has not moved.
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        config: BackupConfig,
        basename: impl Into<String>,
        changes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            pool,
            config,
            basename: basename.into(),
            changes,
            changes_at_last_backup: AtomicU64::new(0),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Backup settings.
    #[must_use]
    pub const fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Takes a backup unless it is a periodic one with nothing new to save.
    pub async fn run(&self, trigger: BackupTrigger) -> Result<BackupOutcome> {
        let changes = self.changes.load(Ordering::Acquire);
        if trigger == BackupTrigger::Periodic
            && changes == self.changes_at_last_backup.load(Ordering::Acquire)
        {
            debug!(trigger = trigger.as_str(), "No changes since last backup, skipping");
            return Ok(BackupOutcome::Skipped);
        }

        if self.in_progress.swap(true, Ordering::AcqRel) {
            debug!(trigger = trigger.as_str(), "Backup already in progress, skipping");
            return Ok(BackupOutcome::Skipped);
        }
        let _guard = InProgress(&self.in_progress);

        tokio::fs::create_dir_all(&self.config.dir).await?;
        let name = backup_file_name(
            trigger,
            Utc::now(),
            self.config.commit.as_deref(),
            &self.basename,
        );
        let path = self.config.dir.join(name);

        debug!(sql = "VACUUM \"main\" INTO ?", path = %path.display(), "Executing SQL");
        sqlx::query("VACUUM \"main\" INTO ?")
            .bind(path.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;
        self.changes_at_last_backup.store(changes, Ordering::Release);
        info!(trigger = trigger.as_str(), path = %path.display(), "Backup written");

        self.rotate().await?;
        Ok(BackupOutcome::Created(path))
    }

    /// Deletes the oldest periodic backups beyond `max_periodic`.
    ///
    /// A file that cannot be deleted is logged and left behind; rotation
    /// carries on with the rest.
    pub async fn rotate(&self) -> Result<Vec<PathBuf>> {
        let mut periodic = list_periodic(&self.config.dir).await?;
        if periodic.len() <= self.config.max_periodic {
            return Ok(Vec::new());
        }

        periodic.sort_by_key(|(at, _)| *at);
        let excess = periodic.len() - self.config.max_periodic;
        let mut removed = Vec::with_capacity(excess);
        for (_, path) in periodic.into_iter().take(excess) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Rotated out old backup");
                    removed.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete old backup");
                }
            }
        }
        Ok(removed)
    }

    /// Runs periodic backups every `interval` until the handle is aborted.
    ///
    /// Ticks missed while a backup runs are skipped, never queued.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run(BackupTrigger::Periodic).await {
                    warn!(error = %e, "Periodic backup failed");
                }
            }
        })
    }
}

async fn list_periodic(dir: &Path) -> Result<Vec<(DateTime<Utc>, PathBuf)>> {
    let prefix = format!("{}-", BackupTrigger::Periodic.as_str());
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut periodic = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) {
            continue;
        }
        if let Some(at) = parse_backup_timestamp(&name) {
            periodic.push((at, entry.path()));
        }
    }
    Ok(periodic)
}
