//! Table models, SQLite DDL and parameterized statements.
//!
//! `oxide-schema` is the pure half of the store: nothing in here touches a
//! database. It provides:
//!
//! - **Models** - [`TableModel`] and [`declare_model`], which infers columns
//!   from a sample instance plus explicit overrides
//! - **DDL** - `CREATE TABLE` and additive `ALTER TABLE ... ADD COLUMN`
//! - **Diff** - additive migration planning against live introspection, and
//!   a field-level changelog against the last snapshot
//! - **Query** - select/insert/update/delete/count/aggregate statements with
//!   positional parameters
//! - **Convert** - the per-column storage type check
//! - **Snapshot** - the versioned model snapshot file format
//!
//! # Example
//!
//! ```rust
//! use oxide_codec::{Codec, TypeRegistry, Value};
//! use oxide_schema::prelude::*;
//!
//! let declaration = ModelDeclaration::new("notes")
//!     .field("title", "")
//!     .field("meta", Value::object([("pinned", Value::Bool(false))]));
//! let model = declare_model(&declaration).unwrap();
//!
//! let registry = TypeRegistry::new();
//! let sql = build_create_table(&model, &Codec::new(&registry)).unwrap();
//! assert!(sql.starts_with(r#"CREATE TABLE "main"."notes" ("id" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT"#));
//! ```

pub mod aggregate;
pub mod column;
pub mod convert;
pub mod ddl;
pub mod diff;
pub mod error;
pub mod model;
pub mod param;
pub mod query;
pub mod snapshot;

pub use column::{Column, ColumnType, StorageType};
pub use error::{Result, SchemaError};
pub use model::{declare_model, ColumnSpec, ModelDeclaration, TableModel};
pub use param::{SqlValue, ToSqlValue};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{avg, count, count_all, count_distinct, max, min, sum, Aggregate};
    pub use crate::column::{Column, ColumnType, StorageType};
    pub use crate::convert::is_provided_type_valid;
    pub use crate::ddl::{build_add_column, build_column_clause, build_create_table};
    pub use crate::diff::{
        diff_models, diff_objects, plan_migration, reconstruct_live_model, IntrospectedColumn,
        MigrationPlan, ModelDiff,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::model::{declare_model, infer_column_type, ColumnSpec, ModelDeclaration, TableModel};
    pub use crate::param::{SqlValue, ToSqlValue};
    pub use crate::query::{
        build_aggregate, build_count, build_delete, build_find_by_key, build_insert, build_select,
        build_update, AggregateQuery, Clause, OrderBy, OrderDirection, Query, SqlRow, Statement,
    };
    pub use crate::snapshot::{parse_snapshot, render_snapshot, ModelSet, ModelSnapshot};
}
