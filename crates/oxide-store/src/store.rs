//! Model registration and schema reconciliation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use oxide_codec::{Codec, TypeRegistry};
use oxide_schema::column::validate_identifier;
use oxide_schema::ddl::build_create_table;
use oxide_schema::diff::{diff_models, plan_migration, ModelDiff};
use oxide_schema::snapshot::ModelSet;
use oxide_schema::{declare_model, ModelDeclaration, TableModel};
use sqlx::sqlite::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backup::{BackupManager, BackupOutcome, BackupTrigger};
use crate::config::StoreConfig;
use crate::database;
use crate::error::{Result, StoreError};
use crate::snapshot_store::{load_snapshot, save_snapshot};
use crate::table::Table;

const BUILTIN_DATABASES: [&str; 2] = ["main", "temp"];

/// What registering one model did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// The declared model.
    pub model: TableModel,
    /// The table did not exist and was created.
    pub created: bool,
    /// DDL statements executed, in order.
    pub applied: Vec<String>,
    /// Changes since the last snapshot.
    pub diff: ModelDiff,
}

/// Summary of a registration pass, returned by [`Store::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Anything changed since the last snapshot.
    pub structural: bool,
    /// Models in the last snapshot that were not registered this time.
    pub removed: Vec<String>,
}

/// Schema-reconciling store over a single SQLite connection.
///
/// Register every model with [`Store::register`], then call
/// [`Store::finalize`] once to report removed models, persist the new
/// snapshot and take a structural backup if anything changed.
#[derive(Debug)]
pub struct Store {
    pool: SqlitePool,
    config: StoreConfig,
    registry: Arc<TypeRegistry>,
    models: IndexMap<String, Arc<TableModel>>,
    previous: ModelSet,
    attached: HashSet<String>,
    changes: Arc<AtomicU64>,
    backups: Option<Arc<BackupManager>>,
    structural: bool,
}

impl Store {
    /// Connects to the configured database and loads the last snapshot.
    ///
    /// `registry` must already hold every custom type the json columns use.
    pub async fn open(config: StoreConfig, registry: TypeRegistry) -> Result<Self> {
        let pool = database::connect(&config.database_url).await?;

        let previous = match &config.snapshot_path {
            Some(path) => load_snapshot(path).await?,
            None => ModelSet::new(),
        };

        let changes = Arc::new(AtomicU64::new(0));
        let backups = config.backup.clone().map(|backup| {
            Arc::new(BackupManager::new(
                pool.clone(),
                backup,
                config.database_basename(),
                Arc::clone(&changes),
            ))
        });

        info!(
            database = %config.database_url,
            snapshot_models = previous.len(),
            backups = backups.is_some(),
            "Store opened"
        );

        Ok(Self {
            pool,
            config,
            registry: Arc::new(registry),
            models: IndexMap::new(),
            previous,
            attached: HashSet::new(),
            changes,
            backups,
            structural: false,
        })
    }

    /// The underlying pool (one connection).
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The custom type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Rows inserted, updated or deleted through this store so far.
    #[must_use]
    pub fn row_changes(&self) -> u64 {
        self.changes.load(Ordering::Acquire)
    }

    /// Attaches an auxiliary database file under `name`.
    pub async fn attach(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        validate_identifier(name)?;
        if BUILTIN_DATABASES.contains(&name) || self.attached.contains(name) {
            return Err(StoreError::DuplicateAttach(name.to_string()));
        }
        let path = path.as_ref().to_string_lossy().into_owned();
        database::attach(&self.pool, name, &path).await?;
        self.attached.insert(name.to_string());
        info!(database = %name, path = %path, "Attached database");
        Ok(())
    }

    /// Declares a model and brings its table in line with it.
    ///
    /// A missing table is created. An existing table gets one
    /// `ADD COLUMN` per declared column it lacks; nothing is ever dropped or
    /// altered, and a primary key mismatch fails without touching the table.
    pub async fn register(&mut self, declaration: ModelDeclaration) -> Result<ReconcileOutcome> {
        let model = declare_model(&declaration)?;
        if !BUILTIN_DATABASES.contains(&model.database.as_str())
            && !self.attached.contains(&model.database)
        {
            return Err(StoreError::UnknownDatabase(model.database.clone()));
        }

        let codec = Codec::new(&self.registry);
        let live = database::introspect(&self.pool, &model.database, &model.table_name).await?;

        let created = live.is_empty();
        let applied = if created {
            let sql = build_create_table(&model, &codec)?;
            database::execute_ddl(&self.pool, &sql).await?;
            info!(model = %declaration.name, table = %model.qualified_name(), "Created table");
            vec![sql]
        } else {
            let plan = plan_migration(&model, &live, &codec)?;
            for sql in &plan.statements {
                database::execute_ddl(&self.pool, sql).await?;
                info!(model = %declaration.name, sql = %sql, "Added column");
            }
            if plan.is_empty() {
                debug!(model = %declaration.name, "Table matches model");
            }
            plan.statements
        };

        let diff = diff_models(self.previous.get(&declaration.name), &model)?;
        if diff.is_structural() {
            self.structural = true;
            info!(model = %declaration.name, changes = %diff, "Structural change");
        }

        self.models
            .insert(declaration.name.clone(), Arc::new(model.clone()));

        Ok(ReconcileOutcome {
            model,
            created,
            applied,
            diff,
        })
    }

    /// Ends a registration pass.
    ///
    /// Reports snapshot models that were not registered, replaces the
    /// snapshot with the registered set and, when anything structural
    /// happened, takes a structural backup.
    pub async fn finalize(&mut self) -> Result<RegistrationReport> {
        let removed: Vec<String> = self
            .previous
            .keys()
            .filter(|name| !self.models.contains_key(*name))
            .cloned()
            .collect();
        for name in &removed {
            info!(model = %name, "Model removed");
        }

        let structural = self.structural || !removed.is_empty();
        let current: ModelSet = self
            .models
            .iter()
            .map(|(name, model)| (name.clone(), TableModel::clone(model)))
            .collect();

        if let Some(path) = &self.config.snapshot_path {
            save_snapshot(path, &current).await?;
        }
        self.previous = current;
        self.structural = false;

        if structural {
            if let Some(backups) = &self.backups {
                backups.run(BackupTrigger::Structural).await?;
            }
        }

        Ok(RegistrationReport {
            structural,
            removed,
        })
    }

    /// Row operations for a registered model.
    pub fn table(&self, name: &str) -> Result<Table> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| StoreError::UnregisteredModel(name.to_string()))?;
        Ok(Table::new(
            self.pool.clone(),
            Arc::clone(model),
            Arc::clone(&self.registry),
            self.config.compat_mode,
            Arc::clone(&self.changes),
        ))
    }

    /// Takes a manual backup now.
    ///
    /// Returns [`BackupOutcome::Skipped`] when backups are not configured or
    /// another backup is running.
    pub async fn backup(&self) -> Result<BackupOutcome> {
        match &self.backups {
            Some(backups) => backups.run(BackupTrigger::Manual).await,
            None => Ok(BackupOutcome::Skipped),
        }
    }

    /// The backup manager, when backups are configured.
    #[must_use]
    pub const fn backup_manager(&self) -> Option<&Arc<BackupManager>> {
        self.backups.as_ref()
    }

    /// Starts periodic backups at the configured interval.
    ///
    /// Returns `None` when backups are not configured.
    #[must_use]
    pub fn spawn_periodic_backups(&self) -> Option<JoinHandle<()>> {
        self.backups.as_ref().map(|backups| {
            let interval = backups.config().interval();
            Arc::clone(backups).spawn_periodic(interval)
        })
    }

    /// Closes the connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
