//! Row operations on one registered model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use oxide_codec::{Codec, Fields, TypeRegistry, Value};
use oxide_schema::convert::is_provided_type_valid;
use oxide_schema::query::{
    build_aggregate, build_count, build_delete, build_find_by_key, build_insert, build_select,
    build_update, AggregateQuery, Clause, Query, SqlRow,
};
use oxide_schema::{Column, SchemaError, TableModel};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::database::{self, column_names, read_column, untyped_value};
use crate::error::{Result, StoreError};
use crate::record::Record;

/// Handle for reading and writing rows of one model.
///
/// Obtained from [`Store::table`](crate::Store::table). Every value crossing
/// the storage boundary is checked against its column's declared type.
#[derive(Debug, Clone)]
pub struct Table {
    pool: SqlitePool,
    model: Arc<TableModel>,
    registry: Arc<TypeRegistry>,
    compat: bool,
    changes: Arc<AtomicU64>,
}

impl Table {
    pub(crate) const fn new(
        pool: SqlitePool,
        model: Arc<TableModel>,
        registry: Arc<TypeRegistry>,
        compat: bool,
        changes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            pool,
            model,
            registry,
            compat,
            changes,
        }
    }

    /// The model this table implements.
    #[must_use]
    pub fn model(&self) -> &TableModel {
        &self.model
    }

    fn codec(&self) -> Codec<'_> {
        Codec::new(&self.registry)
    }

    fn record_changes(&self, rows: u64) {
        self.changes.fetch_add(rows, Ordering::AcqRel);
    }

    /// A new, unsaved record holding the column defaults.
    #[must_use]
    pub fn blank(&self) -> Record {
        let mut record = Record::new();
        for column in &self.model.columns {
            if let Some(default) = &column.default_value {
                record.set(column.name.clone(), default.clone());
            }
        }
        record
    }

    fn primary_key(&self) -> Result<&Column> {
        self.model
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(self.model.table_name.clone()).into())
    }

    /// Fetches the row whose primary key is `key`.
    ///
    /// Fails with a not-found error if there is none, and with
    /// [`StoreError::InvalidKey`] if `key` cannot be a value of the key column.
    pub async fn find_one(&self, key: impl Into<Value>) -> Result<Record> {
        let key = key.into();
        let pk = self.primary_key()?;
        if !is_provided_type_valid(&key, pk) {
            return Err(StoreError::InvalidKey {
                table: self.model.table_name.clone(),
                column: pk.name.clone(),
                expected: pk.column_type.to_string(),
                found: key.kind().to_string(),
            });
        }

        let statement = build_find_by_key(&self.model, pk.to_storage(&key, &self.codec())?)?;
        match database::fetch_optional(&self.pool, &statement).await? {
            Some(row) => self.decode_row(&row),
            None => Err(StoreError::NotFound {
                table: self.model.table_name.clone(),
                key: format!("{key:?}"),
            }),
        }
    }

    /// Like [`Table::find_one`], but a missing row yields [`Table::blank`].
    pub async fn find_one_optional(&self, key: impl Into<Value>) -> Result<Record> {
        match self.find_one(key).await {
            Err(e) if e.is_not_found() => Ok(self.blank()),
            other => other,
        }
    }

    /// Fetches every row matching `query`.
    pub async fn find(&self, query: &Query) -> Result<Vec<Record>> {
        let statement = build_select(&self.model, query);
        database::fetch_all(&self.pool, &statement)
            .await?
            .iter()
            .map(|row| self.decode_row(row))
            .collect()
    }

    /// Counts the rows matching `filter`.
    pub async fn count(&self, filter: impl Into<Clause>) -> Result<u64> {
        let statement = build_count(&self.model, &filter.into());
        let rows = database::fetch_all(&self.pool, &statement).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Runs a grouped aggregate query.
    ///
    /// Result columns named after a model column are decoded with that
    /// column's type; aggregates and other expressions come back as stored.
    pub async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<Fields>> {
        let statement = build_aggregate(&self.model, query);
        database::fetch_all(&self.pool, &statement)
            .await?
            .iter()
            .map(|row| self.decode_fields(row))
            .collect()
    }

    /// Inserts a new record or updates an existing one.
    ///
    /// Inserting fills fields the record lacks with the column default and
    /// writes the generated primary key back into the record.
    pub async fn save(&self, record: &mut Record) -> Result<()> {
        if record.is_new() {
            self.insert(record).await
        } else {
            self.update(record).await
        }
    }

    async fn insert(&self, record: &mut Record) -> Result<()> {
        let codec = self.codec();
        let null = Value::Null;
        let mut row = SqlRow::new();
        for column in &self.model.columns {
            if column.is_primary_key && column.auto_increment {
                continue;
            }
            let value = field_of(record, column)
                .or(column.default_value.as_ref())
                .unwrap_or(&null);
            row.insert(column.name.clone(), column.to_storage(value, &codec)?);
        }

        let statement = build_insert(&self.model, &row);
        let result = database::execute(&self.pool, &statement).await?;
        self.record_changes(result.rows_affected());

        if let Some(pk) = self.model.primary_key().filter(|c| c.auto_increment) {
            record.set(pk.name.clone(), Value::Int(result.last_insert_rowid()));
        }
        record.mark_saved();
        debug!(table = %self.model.table_name, "Inserted row");
        Ok(())
    }

    async fn update(&self, record: &mut Record) -> Result<()> {
        let codec = self.codec();
        let mut row = SqlRow::new();
        for column in &self.model.columns {
            if let Some(value) = field_of(record, column) {
                row.insert(column.name.clone(), column.to_storage(value, &codec)?);
            }
        }

        let statement = build_update(&self.model, &row)?;
        let result = database::execute(&self.pool, &statement).await?;
        self.record_changes(result.rows_affected());
        debug!(table = %self.model.table_name, rows = result.rows_affected(), "Updated row");
        Ok(())
    }

    /// Deletes every row matching `query`; returns how many were deleted.
    pub async fn delete(&self, query: &Query) -> Result<u64> {
        let statement = build_delete(&self.model, query);
        let result = database::execute(&self.pool, &statement).await?;
        self.record_changes(result.rows_affected());
        Ok(result.rows_affected())
    }

    fn decode_fields(&self, row: &SqliteRow) -> Result<Fields> {
        let codec = self.codec();
        let mut fields = Fields::new();
        for (index, name) in column_names(row).into_iter().enumerate() {
            let raw = read_column(row, index)?;
            match self.model.get_column(&name) {
                Some(column) => {
                    let value = column.from_storage(raw, &codec, self.compat)?;
                    fields.insert(column.name.clone(), value);
                }
                // not a model column: an aggregate, an alias or an undeclared column
                None => {
                    fields.insert(name, untyped_value(raw));
                }
            }
        }
        Ok(fields)
    }

    fn decode_row(&self, row: &SqliteRow) -> Result<Record> {
        self.decode_fields(row).map(Record::fetched)
    }
}

/// A record field looked up by logical name, then physical name.
fn field_of<'r>(record: &'r Record, column: &Column) -> Option<&'r Value> {
    record
        .get(&column.name)
        .or_else(|| column.mapped_to.as_deref().and_then(|m| record.get(m)))
}
