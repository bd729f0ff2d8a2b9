//! Integration tests: the persistence façade over the real SQLite primary and
//! the CSV durable log.
//!
//! An unreachable primary is simulated with a database path whose parent
//! directory does not exist; every call against it fails at connection time.

use std::sync::Arc;

use fleetlink_core::{BackendKind, Kind, NewCommand, NewTelemetry, Payload, Persistence};
use fleetlink_csvlog::CsvLog;
use fleetlink_sqlite::SqliteStore;

async fn persistence(primary_reachable: bool) -> (Persistence, Arc<CsvLog>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = if primary_reachable {
        dir.path().join("fleet.db")
    } else {
        dir.path().join("offline").join("fleet.db")
    };
    let primary = Arc::new(SqliteStore::new(db_path).unwrap());
    let durable = Arc::new(CsvLog::open(dir.path().join("log")).await.unwrap());
    (Persistence::new(primary, durable.clone()), durable, dir)
}

#[tokio::test]
async fn healthy_primary_serves_everything() {
    let (persistence, durable, _dir) = persistence(true).await;

    let saved = persistence
        .save(&Payload::from(NewTelemetry::new(7, 41.5, 0.4, 88.0)))
        .await
        .unwrap();
    assert_eq!(saved.backend, BackendKind::Primary);
    assert_eq!(saved.value, 1);

    let listed = persistence.list(Kind::Telemetry, 10).await.unwrap();
    assert_eq!(listed.backend, BackendKind::Primary);
    assert_eq!(listed.value.len(), 1);

    assert!(!durable.path_for(Kind::Telemetry).exists());
}

#[tokio::test]
async fn failing_primary_falls_back_to_durable_log() {
    let (persistence, durable, _dir) = persistence(false).await;

    let saved = persistence
        .save(&Payload::from(NewTelemetry::new(7, 41.5, 0.4, 88.0)))
        .await
        .unwrap();
    assert_eq!(saved.backend, BackendKind::DurableLog);
    assert_eq!(saved.value, 1);

    let cmd = persistence
        .save(&Payload::from(NewCommand::new(7, "lock").with_reason("theft alert")))
        .await
        .unwrap();
    assert_eq!(cmd.backend, BackendKind::DurableLog);

    let listed = persistence.list(Kind::Telemetry, 10).await.unwrap();
    assert_eq!(listed.backend, BackendKind::DurableLog);
    assert_eq!(listed.value.len(), 1);
    assert_eq!(listed.value[0].id(), saved.value);
    assert_eq!(listed.value[0].entity_id(), Some(7));

    let on_disk = std::fs::read_to_string(durable.path_for(Kind::Command)).unwrap();
    assert!(on_disk.contains("lock,theft alert"));
}
