#![allow(dead_code)]

use oxide_codec::{TypeRegistry, Value};
use oxide_schema::diff::IntrospectedColumn;
use oxide_schema::ModelDeclaration;
use oxide_store::{database, Store, StoreConfig};

/// Routes store logs to the test output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn memory_store() -> Store {
    open(StoreConfig::new()).await
}

pub async fn open(config: StoreConfig) -> Store {
    Store::open(config, TypeRegistry::new())
        .await
        .unwrap_or_else(|e| panic!("Failed to open store: {e}"))
}

pub async fn live_columns(store: &Store, database: &str, table: &str) -> Vec<IntrospectedColumn> {
    database::introspect(store.pool(), database, table)
        .await
        .unwrap()
}

pub async fn live_column_names(store: &Store, table: &str) -> Vec<String> {
    live_columns(store, "main", table)
        .await
        .into_iter()
        .map(|c| c.name)
        .collect()
}

pub async fn run_sql(store: &Store, sql: &str) {
    sqlx::query(sql)
        .execute(store.pool())
        .await
        .unwrap_or_else(|e| panic!("Failed to run: {sql}\nError: {e}"));
}

/// `{id, name: string, meta: json}`
pub fn note() -> ModelDeclaration {
    ModelDeclaration::new("Note")
        .table_name("notes")
        .field("name", "")
        .field("meta", Value::object(Vec::<(String, Value)>::new()))
}
