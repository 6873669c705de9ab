//! # oxide-store
//!
//! Runtime schema reconciliation, row access and backups for SQLite tables
//! declared as [`ModelDeclaration`](oxide_schema::ModelDeclaration)s.
//!
//! A [`Store`] owns exactly one connection. Registering a model creates its
//! table, or adds the columns the live table lacks; nothing is ever dropped.
//! Each registration is also compared with the last persisted snapshot so
//! structural changes are logged and can trigger a backup.
//!
//! ```rust,no_run
//! use oxide_codec::{TypeRegistry, Value};
//! use oxide_schema::ModelDeclaration;
//! use oxide_store::{Record, Store, StoreConfig};
//!
//! # async fn run() -> oxide_store::Result<()> {
//! let config = StoreConfig::new()
//!     .database_url("sqlite://app.db")
//!     .snapshot_path("models.json");
//! let mut store = Store::open(config, TypeRegistry::new()).await?;
//!
//! store
//!     .register(ModelDeclaration::new("Note").field("title", "").field("pinned", false))
//!     .await?;
//! store.finalize().await?;
//!
//! let notes = store.table("Note")?;
//! let mut note = Record::new().with("title", "hello");
//! notes.save(&mut note).await?;
//! assert_eq!(note.get("id"), Some(&Value::Int(1)));
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod database;
pub mod error;
pub mod record;
pub mod snapshot_store;
pub mod store;
pub mod table;

pub use backup::{BackupManager, BackupOutcome, BackupTrigger};
pub use config::{BackupConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use record::Record;
pub use store::{ReconcileOutcome, RegistrationReport, Store};
pub use table::Table;
