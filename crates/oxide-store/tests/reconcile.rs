//! Integration tests for model registration against a live database.

mod common;

use common::{init_tracing, live_column_names, live_columns, memory_store, note, open, run_sql};
use oxide_schema::{ColumnSpec, ColumnType, ModelDeclaration, SchemaError};
use oxide_store::snapshot_store::load_snapshot;
use oxide_store::{StoreConfig, StoreError};

// =============================================================================
// Create and additive migration
// =============================================================================

#[tokio::test]
async fn test_missing_table_is_created() {
    init_tracing();
    let mut store = memory_store().await;

    let outcome = store.register(note()).await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.applied.len(), 1);
    assert!(outcome.applied[0].starts_with(r#"CREATE TABLE "main"."notes""#));
    assert!(outcome.diff.created);
    assert_eq!(
        live_column_names(&store, "notes").await,
        vec!["id", "name", "meta"]
    );
}

#[tokio::test]
async fn test_only_missing_column_is_added() {
    let mut store = memory_store().await;
    run_sql(
        &store,
        r#"CREATE TABLE "items" ("id" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, "a" TEXT NOT NULL DEFAULT '')"#,
    )
    .await;

    let declaration = ModelDeclaration::new("Item")
        .table_name("items")
        .field("a", "")
        .field("b", 0_i64);
    let outcome = store.register(declaration).await.unwrap();

    assert!(!outcome.created);
    assert_eq!(
        outcome.applied,
        vec![r#"ALTER TABLE "main"."items" ADD COLUMN "b" INTEGER NOT NULL DEFAULT 0"#]
    );
    assert_eq!(live_column_names(&store, "items").await, vec!["id", "a", "b"]);
}

#[tokio::test]
async fn test_not_null_column_without_default_is_refused() {
    let mut store = memory_store().await;
    run_sql(
        &store,
        r#"CREATE TABLE "items" ("id" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, "a" TEXT NOT NULL DEFAULT '')"#,
    )
    .await;
    run_sql(&store, r#"INSERT INTO "items" ("a") VALUES ('x')"#).await;

    let declaration = ModelDeclaration::new("Item")
        .table_name("items")
        .field("a", "")
        .field("c", "")
        .column(ColumnSpec::new("b").column_type(ColumnType::Integer));
    let err = store.register(declaration).await.unwrap_err();

    assert!(matches!(
        &err,
        StoreError::Schema(SchemaError::NotNullWithoutDefault { column, .. }) if column == "b"
    ));
    assert!(err.is_configuration());
    // "c" could have been added, but nothing runs once the plan is refused
    assert_eq!(live_column_names(&store, "items").await, vec!["id", "a"]);

    let nullable = ModelDeclaration::new("Item")
        .table_name("items")
        .field("a", "")
        .column(
            ColumnSpec::new("b")
                .column_type(ColumnType::Integer)
                .nullable(true),
        );
    let outcome = store.register(nullable).await.unwrap();
    assert_eq!(
        outcome.applied,
        vec![r#"ALTER TABLE "main"."items" ADD COLUMN "b" INTEGER"#]
    );
}

#[tokio::test]
async fn test_reregistering_is_idempotent() {
    let mut store = memory_store().await;
    store.register(note()).await.unwrap();

    let again = store.register(note()).await.unwrap();
    assert!(!again.created);
    assert!(again.applied.is_empty());
}

#[tokio::test]
async fn test_mapped_column_added_under_physical_name() {
    let mut store = memory_store().await;
    run_sql(&store, r#"CREATE TABLE "events" ("id" INTEGER PRIMARY KEY)"#).await;

    let declaration = ModelDeclaration::new("Event")
        .table_name("events")
        .field("createdAt", 0.0)
        .column(ColumnSpec::new("createdAt").mapped_to("created_at"));
    let outcome = store.register(declaration).await.unwrap();

    assert_eq!(
        outcome.applied,
        vec![r#"ALTER TABLE "main"."events" ADD COLUMN "created_at" REAL NOT NULL DEFAULT 0"#]
    );
    assert_eq!(
        live_column_names(&store, "events").await,
        vec!["id", "created_at"]
    );
}

// =============================================================================
// Configuration errors
// =============================================================================

#[tokio::test]
async fn test_primary_key_conflict_leaves_table_untouched() {
    let mut store = memory_store().await;
    run_sql(
        &store,
        r#"CREATE TABLE "people" ("uuid" TEXT NOT NULL PRIMARY KEY, "name" TEXT)"#,
    )
    .await;
    let before = live_columns(&store, "main", "people").await;

    let declaration = ModelDeclaration::new("Person")
        .table_name("people")
        .field("name", "")
        .field("email", "");
    let err = store.register(declaration).await.unwrap_err();

    assert!(matches!(
        &err,
        StoreError::Schema(SchemaError::PrimaryKeyConflict { live: Some(live), declared: Some(declared), .. })
            if live == "uuid" && declared == "id"
    ));
    assert!(err.is_configuration());
    assert_eq!(live_columns(&store, "main", "people").await, before);
    assert!(store.table("Person").is_err());
}

#[tokio::test]
async fn test_invalid_declarations() {
    let mut store = memory_store().await;

    let autoinc_text = ModelDeclaration::new("Slug")
        .field("slug", "")
        .column(ColumnSpec::new("slug").primary_key().auto_increment());
    let err = store.register(autoinc_text).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Schema(SchemaError::AutoIncrementOnNonInteger { .. })
    ));

    let two_keys = ModelDeclaration::new("Pair")
        .column(ColumnSpec::new("a").column_type(ColumnType::Integer).primary_key())
        .column(ColumnSpec::new("b").column_type(ColumnType::Integer).primary_key());
    let err = store.register(two_keys).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Schema(SchemaError::DuplicatePrimaryKey { .. })
    ));
    assert!(err.is_configuration());

    assert!(matches!(
        store.table("Ghost"),
        Err(StoreError::UnregisteredModel(name)) if name == "Ghost"
    ));
}

// =============================================================================
// Auxiliary databases
// =============================================================================

#[tokio::test]
async fn test_attached_database() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = memory_store().await;
    store.attach("aux", dir.path().join("aux.db")).await.unwrap();

    let outcome = store
        .register(ModelDeclaration::new("Log").database("aux").field("line", ""))
        .await
        .unwrap();
    assert!(outcome.applied[0].starts_with(r#"CREATE TABLE "aux"."Log""#));
    assert_eq!(live_columns(&store, "aux", "Log").await.len(), 2);
    assert!(live_columns(&store, "main", "Log").await.is_empty());

    let err = store.attach("aux", dir.path().join("other.db")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateAttach(_)));
    assert!(err.is_configuration());
    assert!(matches!(
        store.attach("main", dir.path().join("main.db")).await,
        Err(StoreError::DuplicateAttach(_))
    ));
    assert!(matches!(
        store.attach("bad name", dir.path().join("x.db")).await,
        Err(StoreError::Schema(SchemaError::InvalidIdentifier(_)))
    ));
}

#[tokio::test]
async fn test_unknown_database() {
    let mut store = memory_store().await;
    let err = store
        .register(ModelDeclaration::new("Log").database("archive").field("line", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownDatabase(name) if name == "archive"));
}

// =============================================================================
// Snapshot and structural changes
// =============================================================================

#[tokio::test]
async fn test_snapshot_across_restarts() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("models.json");
    let database_url = format!("sqlite://{}", dir.path().join("app.db").display());
    let config = StoreConfig::new()
        .database_url(&database_url)
        .snapshot_path(&snapshot);

    // first start: everything is new
    let mut store = open(config.clone()).await;
    store.register(note()).await.unwrap();
    store
        .register(ModelDeclaration::new("Tag").field("label", ""))
        .await
        .unwrap();
    let report = store.finalize().await.unwrap();
    assert!(report.structural);
    assert!(report.removed.is_empty());

    let saved = load_snapshot(&snapshot).await.unwrap();
    let names: Vec<_> = saved.keys().cloned().collect();
    assert_eq!(names, vec!["Note", "Tag"]);
    assert_eq!(saved["Note"].table_name, "notes");
    store.close().await;

    // same models: nothing structural
    let mut store = open(config.clone()).await;
    let outcome = store.register(note()).await.unwrap();
    assert!(!outcome.created);
    assert!(!outcome.diff.is_structural());
    store
        .register(ModelDeclaration::new("Tag").field("label", ""))
        .await
        .unwrap();
    let report = store.finalize().await.unwrap();
    assert!(!report.structural);
    store.close().await;

    // a new column on Note, Tag dropped
    let mut store = open(config).await;
    let outcome = store
        .register(note().field("pinned", false))
        .await
        .unwrap();
    assert_eq!(outcome.diff.added, vec!["pinned"]);
    assert_eq!(outcome.diff.to_string(), "added column pinned");
    assert_eq!(outcome.applied.len(), 1);

    let report = store.finalize().await.unwrap();
    assert!(report.structural);
    assert_eq!(report.removed, vec!["Tag"]);
    assert!(!load_snapshot(&snapshot).await.unwrap().contains_key("Tag"));
    // the table itself is never dropped
    assert!(!live_column_names(&store, "Tag").await.is_empty());
}

#[tokio::test]
async fn test_column_change_is_structural_without_ddl() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new().snapshot_path(dir.path().join("models.json"));

    let mut store = open(config.clone()).await;
    store.register(note()).await.unwrap();
    store.finalize().await.unwrap();
    store.close().await;

    let mut store = open(config).await;
    run_sql(
        &store,
        r#"CREATE TABLE "notes" ("id" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, "name" TEXT, "meta" TEXT)"#,
    )
    .await;
    let outcome = store
        .register(note().column(ColumnSpec::new("name").nullable(true)))
        .await
        .unwrap();

    assert!(outcome.applied.is_empty());
    assert!(outcome.diff.is_structural());
    assert_eq!(outcome.diff.changed.len(), 1);
    assert_eq!(outcome.diff.changed[0].0, "name");
}
