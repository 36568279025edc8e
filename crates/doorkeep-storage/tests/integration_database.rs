//! Integration tests for the on-disk code store
//!
//! Run with: cargo test --package doorkeep-storage --test integration_database

use doorkeep_core::{AccessCode, CodeKind, IsoTimestamp};
use doorkeep_storage::{CodeStore, Database, DatabaseConfig, StorageError};
use tempfile::TempDir;

fn sample_code() -> AccessCode {
    let mut code = AccessCode::new("8080", "Plumber")
        .with_kinds([CodeKind::Active, CodeKind::Duration, CodeKind::Day]);
    code.validity_hours = 12;
    code.usage = 3;
    code.first_use = IsoTimestamp::new("2025-05-05T10:00:00+0200");
    code.days = vec!["mon".to_string()];
    code
}

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("codes.db");
    let config = DatabaseConfig::new(path.to_string_lossy().to_string());

    let db = Database::new(config.clone()).await.unwrap();
    db.code_store().put(&sample_code()).await.unwrap();
    db.close().await;

    let reopened = Database::new(config).await.unwrap();
    let loaded = reopened.code_store().get("8080").await.unwrap();
    assert_eq!(loaded, Some(sample_code()));
    reopened.close().await;
}

#[tokio::test]
async fn test_creates_missing_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("codes.db");

    let db = Database::new(DatabaseConfig::new(path.to_string_lossy().to_string()))
        .await
        .unwrap();
    db.health_check().await.unwrap();
    assert!(path.exists());
    db.close().await;
}

#[tokio::test]
async fn test_missing_file_without_create_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.db");

    let result = Database::new(
        DatabaseConfig::new(path.to_string_lossy().to_string()).create_if_missing(false),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();

    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    db.code_store().put(&sample_code()).await.unwrap();
    assert_eq!(db.code_store().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_puts_of_distinct_codes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("codes.db");
    let db = Database::new(DatabaseConfig::new(path.to_string_lossy().to_string()))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = db.code_store();
            tokio::spawn(async move {
                store
                    .put(&AccessCode::new(format!("90{i}"), format!("Worker {i}")))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(db.code_store().list().await.unwrap().len(), 8);
    db.close().await;
}

#[tokio::test]
async fn test_store_closed_error() {
    let db = Database::in_memory().await.unwrap();
    let store = db.code_store();
    db.close().await;

    assert!(matches!(store.get("1").await, Err(StorageError::Closed)));
}
