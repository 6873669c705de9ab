//! The single SQLite connection and the statement plumbing around it.

use std::str::FromStr;

use oxide_codec::Value;
use oxide_schema::diff::IntrospectedColumn;
use oxide_schema::query::Statement;
use oxide_schema::SqlValue;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteQueryResult,
    SqliteRow,
};
use sqlx::{Column as _, Row, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::Result;

/// Opens a pool holding exactly one connection that is never recycled.
///
/// Attached databases and in-memory data belong to a connection, so the
/// pool must never drop it and open another.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Binds a SqlValue parameter to a raw query.
fn bind_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

fn prepare(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing SQL");
    statement
        .params
        .iter()
        .cloned()
        .fold(sqlx::query(&statement.sql), bind_param)
}

/// Runs a statement that returns no rows.
pub async fn execute(pool: &SqlitePool, statement: &Statement) -> Result<SqliteQueryResult> {
    Ok(prepare(statement).execute(pool).await?)
}

/// Runs a parameterless DDL statement.
pub async fn execute_ddl(pool: &SqlitePool, sql: &str) -> Result<()> {
    debug!(sql = %sql, "Executing SQL");
    sqlx::query(sql).execute(pool).await?;
    Ok(())
}

/// Runs a query and returns all rows.
pub async fn fetch_all(pool: &SqlitePool, statement: &Statement) -> Result<Vec<SqliteRow>> {
    Ok(prepare(statement).fetch_all(pool).await?)
}

/// Runs a query and returns the first row, if any.
pub async fn fetch_optional(pool: &SqlitePool, statement: &Statement) -> Result<Option<SqliteRow>> {
    Ok(prepare(statement).fetch_optional(pool).await?)
}

/// Reads the live column list of a table; empty if the table does not exist.
pub async fn introspect(
    pool: &SqlitePool,
    database: &str,
    table: &str,
) -> Result<Vec<IntrospectedColumn>> {
    let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?, ?) ORDER BY cid",
    )
    .bind(table)
    .bind(database)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, column_type, notnull, dflt_value, pk)| IntrospectedColumn {
            name,
            column_type,
            notnull: notnull != 0,
            dflt_value,
            pk: pk > 0,
        })
        .collect())
}

/// Reads one column of a row as stored, whatever its declared type.
pub fn read_column(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked(index)?),
        "REAL" | "NUMERIC" => SqlValue::Float(row.try_get_unchecked(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

/// Column names of a row, in select order.
pub fn column_names(row: &SqliteRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Converts a stored value with no column type to go by.
#[must_use]
pub fn untyped_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(b),
        SqlValue::Int(i) => Value::Int(i),
        SqlValue::Float(f) => Value::Float(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Buffer(b),
    }
}

/// Attaches `path` under `name` on the connection.
pub async fn attach(pool: &SqlitePool, name: &str, path: &str) -> Result<()> {
    let sql = format!("ATTACH DATABASE ? AS \"{name}\"");
    debug!(sql = %sql, path = %path, "Executing SQL");
    sqlx::query(&sql).bind(path).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_introspect_missing_table_is_empty() {
        let pool = pool().await;
        assert!(introspect(&pool, "main", "nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_introspect_columns() {
        let pool = pool().await;
        execute_ddl(
            &pool,
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL DEFAULT 'x', n REAL)",
        )
        .await
        .unwrap();

        let columns = introspect(&pool, "main", "items").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label", "n"]);
        assert!(columns[0].pk);
        assert!(columns[1].notnull);
        assert_eq!(columns[1].dflt_value.as_deref(), Some("'x'"));
        assert_eq!(columns[2].column_type, "REAL");
    }

    #[tokio::test]
    async fn test_read_storage_classes() {
        let pool = pool().await;
        let statement = Statement {
            sql: "SELECT ?, ?, ?, ?, ?".to_string(),
            params: vec![
                SqlValue::Null,
                SqlValue::Int(7),
                SqlValue::Float(1.5),
                SqlValue::Text("t".into()),
                SqlValue::Blob(vec![1, 2]),
            ],
        };
        let row = fetch_optional(&pool, &statement).await.unwrap().unwrap();
        let values: Vec<_> = (0..5).map(|i| read_column(&row, i).unwrap()).collect();
        assert_eq!(
            values,
            vec![
                SqlValue::Null,
                SqlValue::Int(7),
                SqlValue::Float(1.5),
                SqlValue::Text("t".into()),
                SqlValue::Blob(vec![1, 2]),
            ]
        );
    }

    #[tokio::test]
    async fn test_state_survives_between_statements() {
        let pool = pool().await;
        execute_ddl(&pool, "CREATE TABLE t (a INTEGER)").await.unwrap();
        execute_ddl(&pool, "INSERT INTO t VALUES (1)").await.unwrap();
        let rows = fetch_all(
            &pool,
            &Statement {
                sql: "SELECT a FROM t".into(),
                params: vec![],
            },
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
