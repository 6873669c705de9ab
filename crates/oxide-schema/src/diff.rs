//! Live-schema comparison and model changelog.
//!
//! Two different comparisons live here:
//!
//! - [`plan_migration`] compares the declared model with what the database
//!   actually has and yields the additive `ADD COLUMN` statements needed to
//!   catch up. A primary key that differs is refused outright.
//! - [`diff_models`] compares the declared model with the last persisted
//!   snapshot and reports what changed, for logging and backup triggering.
//!   It never produces DDL.

use std::collections::BTreeSet;
use std::fmt;

use oxide_codec::Codec;
use serde_json::{Map as JsonMap, Value as Json};

use crate::column::{Column, StorageType};
use crate::ddl::build_add_column;
use crate::error::{Result, SchemaError};
use crate::model::TableModel;

/// One row of live schema introspection (`pragma_table_info`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedColumn {
    /// Physical column name.
    pub name: String,
    /// Declared storage type, as the engine reports it.
    pub column_type: String,
    /// Whether the column is NOT NULL.
    pub notnull: bool,
    /// Default expression text.
    pub dflt_value: Option<String>,
    /// Whether the column is (part of) the primary key.
    pub pk: bool,
}

impl IntrospectedColumn {
    /// Creates a nullable, non-key introspection row.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            notnull: false,
            dflt_value: None,
            pk: false,
        }
    }

    /// Marks this row as the primary key.
    #[must_use]
    pub fn pk(mut self) -> Self {
        self.pk = true;
        self.notnull = true;
        self
    }
}

/// Rebuilds the model the live table currently implements.
///
/// Columns the declaration knows keep their declared metadata, since the
/// storage type is coarser than the declared type. Unknown columns keep their
/// physical name and a type guessed from storage.
#[must_use]
pub fn reconstruct_live_model(declared: &TableModel, introspected: &[IntrospectedColumn]) -> TableModel {
    let columns = introspected
        .iter()
        .map(|live| {
            let mut column = declared.get_column(&live.name).cloned().unwrap_or_else(|| {
                Column::new(
                    live.name.clone(),
                    StorageType::guess_column_type(&live.column_type),
                )
            });
            column.is_primary_key = live.pk;
            column.nullable = !live.notnull;
            column
        })
        .collect();

    TableModel {
        table_name: declared.table_name.clone(),
        database: declared.database.clone(),
        columns,
    }
}

/// Additive changes needed to bring a live table up to its declared model.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Declared columns the live table lacks.
    pub missing: Vec<Column>,
    /// One `ALTER TABLE ... ADD COLUMN` per missing column.
    pub statements: Vec<String>,
}

impl MigrationPlan {
    /// Returns `true` if the live table already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Computes the additive migration for an existing table.
///
/// `introspected` must describe an existing table; a missing table is
/// created from the model instead. Fails with
/// [`SchemaError::PrimaryKeyConflict`] if the live primary key is not the
/// declared one, and with [`SchemaError::NotNullWithoutDefault`] if a missing
/// column could not be added to a table that already has rows.
pub fn plan_migration(
    declared: &TableModel,
    introspected: &[IntrospectedColumn],
    codec: &Codec<'_>,
) -> Result<MigrationPlan> {
    let live = reconstruct_live_model(declared, introspected);

    let live_pk = live.primary_key().map(|c| c.physical_name().to_string());
    let declared_pk = declared.primary_key().map(|c| c.physical_name().to_string());
    if live_pk != declared_pk {
        return Err(SchemaError::PrimaryKeyConflict {
            table: declared.table_name.clone(),
            live: live_pk,
            declared: declared_pk,
        });
    }

    let missing: Vec<Column> = declared
        .columns
        .iter()
        .filter(|c| live.get_column(c.physical_name()).is_none())
        .cloned()
        .collect();

    // SQLite refuses to add a NOT NULL column without a default once the
    // table has rows; fail before any statement runs
    if let Some(column) = missing
        .iter()
        .find(|c| !c.nullable && !matches!(&c.default_value, Some(v) if !v.is_null()))
    {
        return Err(SchemaError::NotNullWithoutDefault {
            table: declared.table_name.clone(),
            column: column.name.clone(),
        });
    }

    let statements = missing
        .iter()
        .map(|c| build_add_column(declared, c, codec))
        .collect::<Result<Vec<_>>>()?;

    Ok(MigrationPlan {
        missing,
        statements,
    })
}

/// One differing field found by [`diff_objects`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Dotted path of the field.
    pub path: String,
    /// Previous value, `None` if the field was added.
    pub old: Option<Json>,
    /// New value, `None` if the field was removed.
    pub new: Option<Json>,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Json>| v.as_ref().map_or_else(|| "(none)".to_string(), Json::to_string);
        write!(f, "{}: {} ⇒ {}", self.path, show(&self.old), show(&self.new))
    }
}

/// Field-level diff of two JSON values.
///
/// Objects are compared key by key and nested objects recursively; any other
/// pair of differing values is reported as one change at its path.
#[must_use]
pub fn diff_objects(old: &Json, new: &Json) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_into("", old, new, &mut changes);
    changes
}

fn diff_into(path: &str, old: &Json, new: &Json, changes: &mut Vec<FieldChange>) {
    let (Json::Object(old_map), Json::Object(new_map)) = (old, new) else {
        if old != new {
            changes.push(FieldChange {
                path: path.to_string(),
                old: Some(old.clone()),
                new: Some(new.clone()),
            });
        }
        return;
    };

    let keys: BTreeSet<&String> = old_map.keys().chain(new_map.keys()).collect();
    for key in keys {
        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match (old_map.get(key), new_map.get(key)) {
            (Some(o), Some(n)) => diff_into(&child, o, n, changes),
            (o, n) => changes.push(FieldChange {
                path: child,
                old: o.cloned(),
                new: n.cloned(),
            }),
        }
    }
}

/// Column metadata compared across snapshots; the default is left out
/// because its serialized form is not stable.
fn column_metadata(column: &Column) -> Result<Json> {
    let mut column = column.clone();
    column.default_value = None;
    let mut json = serde_json::to_value(&column)?;
    if let Json::Object(map) = &mut json {
        map.remove("defaultValue");
    }
    Ok(json)
}

fn table_metadata(model: &TableModel) -> Json {
    let mut map = JsonMap::new();
    map.insert("tableName".to_string(), Json::String(model.table_name.clone()));
    map.insert("database".to_string(), Json::String(model.database.clone()));
    Json::Object(map)
}

/// What changed in a model since its last snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDiff {
    /// The model had no snapshot.
    pub created: bool,
    /// Table name or database changes.
    pub table: Vec<FieldChange>,
    /// Columns new since the snapshot.
    pub added: Vec<String>,
    /// Columns dropped from the declaration.
    pub removed: Vec<String>,
    /// Columns whose metadata changed.
    pub changed: Vec<(String, Vec<FieldChange>)>,
}

impl ModelDiff {
    /// Whether anything changed that warrants a changelog entry and backup.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.created
            || !self.table.is_empty()
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.changed.is_empty()
    }
}

impl fmt::Display for ModelDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        if self.created {
            lines.push("new model".to_string());
        }
        lines.extend(self.table.iter().map(|c| format!("table {c}")));
        lines.extend(self.added.iter().map(|name| format!("added column {name}")));
        lines.extend(self.removed.iter().map(|name| format!("removed column {name}")));
        for (name, changes) in &self.changed {
            lines.extend(changes.iter().map(|c| format!("column {name}: {c}")));
        }
        f.write_str(&lines.join("\n"))
    }
}

/// Compares a declared model with its previous snapshot.
pub fn diff_models(previous: Option<&TableModel>, next: &TableModel) -> Result<ModelDiff> {
    let Some(previous) = previous else {
        return Ok(ModelDiff {
            created: true,
            added: next.columns.iter().map(|c| c.name.clone()).collect(),
            ..ModelDiff::default()
        });
    };

    let mut diff = ModelDiff {
        table: diff_objects(&table_metadata(previous), &table_metadata(next)),
        ..ModelDiff::default()
    };

    for column in &next.columns {
        match previous.columns.iter().find(|c| c.name == column.name) {
            None => diff.added.push(column.name.clone()),
            Some(old) => {
                let changes = diff_objects(&column_metadata(old)?, &column_metadata(column)?);
                if !changes.is_empty() {
                    diff.changed.push((column.name.clone(), changes));
                }
            }
        }
    }

    diff.removed = previous
        .columns
        .iter()
        .filter(|old| !next.columns.iter().any(|c| c.name == old.name))
        .map(|old| old.name.clone())
        .collect();

    Ok(diff)
}
