//! # fleetlink-sqlite
//!
//! Primary store backend for FleetLink on SQLite.
//!
//! A dedicated OS thread owns every `rusqlite` call. Async callers send
//! [`DbCommand`] messages via `std::sync::mpsc::sync_channel` and await a
//! `tokio::sync::oneshot` reply, so the executor never blocks on disk I/O.
//!
//! Each command opens its own connection, runs inside one transaction where it
//! writes, and closes the connection again. A database that cannot be opened
//! (missing directory, locked file, corrupt schema) therefore fails only the
//! current call, reported as [`StoreError::PrimaryUnavailable`], and the next
//! call tries again from scratch.
//!
//! One table per kind (`t_iot_telemetry`, `t_iot_command`,
//! `t_iot_detection`), ids assigned as `max(id) + 1`, timestamps stored as
//! `YYYY-MM-DD HH:MM:SS` text.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetlink_sqlite::SqliteStore;
//! use std::sync::Arc;
//!
//! let primary = Arc::new(SqliteStore::new("./data/fleet.db")?);
//! ```

use std::path::{Path, PathBuf};

use fleetlink_core::backend::{BoxFuture, StoreBackend};
use fleetlink_core::record::{CommandRecord, DetectionRecord, TelemetryRecord};
use fleetlink_core::{Kind, Payload, Record, StoreError, StoreResult, Timestamp};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS t_iot_telemetry (
        id       INTEGER PRIMARY KEY,
        id_moto  INTEGER NOT NULL,
        temp_c   REAL    NOT NULL,
        vib      REAL    NOT NULL,
        batt_pct REAL    NOT NULL,
        ts       TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_telemetry_ts ON t_iot_telemetry(ts DESC);

    CREATE TABLE IF NOT EXISTS t_iot_command (
        id      INTEGER PRIMARY KEY,
        id_moto INTEGER NOT NULL,
        kind    TEXT    NOT NULL,
        reason  TEXT,
        ts      TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_command_ts ON t_iot_command(ts DESC);

    CREATE TABLE IF NOT EXISTS t_iot_detection (
        id       INTEGER PRIMARY KEY,
        source   TEXT    NOT NULL,
        label    TEXT    NOT NULL,
        conf     REAL    NOT NULL,
        x        INTEGER NOT NULL,
        y        INTEGER NOT NULL,
        w        INTEGER NOT NULL,
        h        INTEGER NOT NULL,
        frame_id INTEGER,
        id_moto  INTEGER,
        region   TEXT,
        ts       TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_detection_ts ON t_iot_detection(ts DESC);
";

// ---------------------------------------------------------------------------
// Command enum: sent from async callers to the worker thread
// ---------------------------------------------------------------------------

enum DbCommand {
    Insert {
        payload: Payload,
        at: Timestamp,
        reply: tokio::sync::oneshot::Sender<StoreResult<u64>>,
    },
    List {
        kind: Kind,
        limit: usize,
        reply: tokio::sync::oneshot::Sender<StoreResult<Vec<Record>>>,
    },
}

// ---------------------------------------------------------------------------
// SqliteStore: the public API
// ---------------------------------------------------------------------------

/// SQLite primary store.
///
/// `Clone` is cheap: it only clones the channel handle. The worker thread
/// exits once every clone has been dropped.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    tx: std::sync::mpsc::SyncSender<DbCommand>,
}

impl SqliteStore {
    /// Starts the worker thread for the database at `path`.
    ///
    /// The database is not opened here; an unreachable path only shows up as
    /// `PrimaryUnavailable` on the first call.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = std::sync::mpsc::sync_channel::<DbCommand>(64);

        let worker_path = path.clone();
        std::thread::Builder::new()
            .name("fleetlink-sqlite".to_string())
            .spawn(move || run_db_thread(worker_path, rx))
            .map_err(StoreError::primary_unavailable)?;

        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Worker thread: blocking event loop
// ---------------------------------------------------------------------------

fn run_db_thread(path: PathBuf, rx: std::sync::mpsc::Receiver<DbCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            DbCommand::Insert { payload, at, reply } => {
                let result = open(&path).and_then(|mut conn| insert_sync(&mut conn, &payload, at));
                let _ = reply.send(result.map_err(unavailable));
            }
            DbCommand::List { kind, limit, reply } => {
                let result = open(&path).and_then(|conn| list_sync(&conn, kind, limit));
                let _ = reply.send(result.map_err(unavailable));
            }
        }
    }
    // All SyncSender handles dropped → exit cleanly.
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::primary_unavailable(e)
}

// ---------------------------------------------------------------------------
// SQL helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn to_sql_int(value: u64) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn next_id(tx: &Transaction<'_>, kind: Kind) -> rusqlite::Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {}", kind.table());
    tx.query_row(&sql, [], |row| row.get(0))
}

/// Inserts under `max(id) + 1` in one transaction. Any error drops the
/// transaction, which rolls it back.
fn insert_sync(conn: &mut Connection, payload: &Payload, at: Timestamp) -> rusqlite::Result<u64> {
    let tx = conn.transaction()?;
    let id = next_id(&tx, payload.kind())?;
    let ts = at.to_string();

    match payload {
        Payload::Telemetry(t) => {
            tx.execute(
                "INSERT INTO t_iot_telemetry (id, id_moto, temp_c, vib, batt_pct, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    to_sql_int(t.entity_id)?,
                    t.temperature,
                    t.vibration,
                    t.battery_pct,
                    ts
                ],
            )?;
        }
        Payload::Command(c) => {
            tx.execute(
                "INSERT INTO t_iot_command (id, id_moto, kind, reason, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, to_sql_int(c.entity_id)?, c.kind, c.reason, ts],
            )?;
        }
        Payload::Detection(d) => {
            let entity = d.entity_id.map(to_sql_int).transpose()?;
            tx.execute(
                "INSERT INTO t_iot_detection
                     (id, source, label, conf, x, y, w, h, frame_id, id_moto, region, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    d.source,
                    d.label,
                    d.confidence,
                    d.x,
                    d.y,
                    d.w,
                    d.h,
                    d.frame_id,
                    entity,
                    d.region,
                    ts
                ],
            )?;
        }
    }

    tx.commit()?;

    #[cfg(feature = "tracing")]
    tracing::debug!("SQLite: inserted {} #{}", payload.kind(), id);

    // `id` comes from COALESCE(MAX(id), 0) + 1 and is at least 1.
    Ok(id as u64)
}

fn list_sync(conn: &Connection, kind: Kind, limit: usize) -> rusqlite::Result<Vec<Record>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
        "SELECT {} FROM {} ORDER BY ts DESC, id DESC LIMIT ?1",
        kind.header().join(", "),
        kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], |row| decode(kind, row))?;
    rows.collect()
}

fn get_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, raw))
}

fn get_opt_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|v| u64::try_from(v).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, v)))
        .transpose()
}

fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    Timestamp::parse(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Builds a record from a row selected in [`Kind::header`] column order.
fn decode(kind: Kind, row: &Row<'_>) -> rusqlite::Result<Record> {
    let record = match kind {
        Kind::Telemetry => Record::Telemetry(TelemetryRecord {
            id: get_u64(row, 0)?,
            entity_id: get_u64(row, 1)?,
            temperature: row.get(2)?,
            vibration: row.get(3)?,
            battery_pct: row.get(4)?,
            timestamp: get_timestamp(row, 5)?,
        }),
        Kind::Command => Record::Command(CommandRecord {
            id: get_u64(row, 0)?,
            entity_id: get_u64(row, 1)?,
            kind: row.get(2)?,
            reason: row.get(3)?,
            timestamp: get_timestamp(row, 4)?,
        }),
        Kind::Detection => Record::Detection(DetectionRecord {
            id: get_u64(row, 0)?,
            source: row.get(1)?,
            label: row.get(2)?,
            confidence: row.get(3)?,
            x: row.get(4)?,
            y: row.get(5)?,
            w: row.get(6)?,
            h: row.get(7)?,
            frame_id: row.get(8)?,
            entity_id: get_opt_u64(row, 9)?,
            region: row.get(10)?,
            timestamp: get_timestamp(row, 11)?,
        }),
    };
    Ok(record)
}

// ---------------------------------------------------------------------------
// send_cmd! macro: enqueue + await oneshot
// ---------------------------------------------------------------------------

macro_rules! send_cmd {
    ($tx:expr, $cmd:expr) => {{
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        $tx.send($cmd(reply_tx))
            .map_err(|_| StoreError::BackendShutdown)?;
        reply_rx.await.map_err(|_| StoreError::BackendShutdown)?
    }};
}

// ---------------------------------------------------------------------------
// StoreBackend impl
// ---------------------------------------------------------------------------

impl StoreBackend for SqliteStore {
    fn insert<'a>(&'a self, payload: &'a Payload, at: Timestamp) -> BoxFuture<'a, StoreResult<u64>> {
        let payload = payload.clone();
        let tx = self.tx.clone();
        Box::pin(async move { send_cmd!(tx, |reply| DbCommand::Insert { payload, at, reply }) })
    }

    fn list(&self, kind: Kind, limit: usize) -> BoxFuture<'_, StoreResult<Vec<Record>>> {
        let tx = self.tx.clone();
        Box::pin(async move { send_cmd!(tx, |reply| DbCommand::List { kind, limit, reply }) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{NewCommand, NewDetection, NewTelemetry};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("fleet.db")).unwrap();

        let first = Payload::from(NewTelemetry::new(7, 41.5, 0.4, 88.0));
        let second = Payload::from(NewTelemetry::new(8, 39.0, 1.4, 52.0));
        assert_eq!(store.insert(&first, ts("2024-05-01 10:00:00")).await.unwrap(), 1);
        assert_eq!(store.insert(&second, ts("2024-05-01 10:00:05")).await.unwrap(), 2);

        let rows = store.list(Kind::Telemetry, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], second.to_record(2, ts("2024-05-01 10:00:05")));
        assert_eq!(rows[1], first.to_record(1, ts("2024-05-01 10:00:00")));
    }

    #[tokio::test]
    async fn test_ids_are_scoped_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("fleet.db")).unwrap();
        let now = Timestamp::now();

        let telemetry = Payload::from(NewTelemetry::new(1, 30.0, 0.0, 90.0));
        store.insert(&telemetry, now).await.unwrap();
        store.insert(&telemetry, now).await.unwrap();

        let cmd = Payload::from(NewCommand::new(1, "lock").with_reason("parked"));
        assert_eq!(store.insert(&cmd, now).await.unwrap(), 1);

        let detection = Payload::from(
            NewDetection::new("cam-2", "moto", 0.82, (10, 20, 64, 48))
                .with_frame(311)
                .with_entity(1)
                .with_region("gate"),
        );
        assert_eq!(store.insert(&detection, now).await.unwrap(), 1);
        assert_eq!(
            store.list(Kind::Detection, 1).await.unwrap(),
            vec![detection.to_record(1, now)]
        );
    }

    #[tokio::test]
    async fn test_next_id_follows_max_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.db");
        {
            let conn = open(&path).unwrap();
            conn.execute(
                "INSERT INTO t_iot_command (id, id_moto, kind, reason, ts)
                 VALUES (41, 3, 'horn', NULL, '2024-05-01 09:00:00')",
                [],
            )
            .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        let id = store
            .insert(&Payload::from(NewCommand::new(3, "unlock")), Timestamp::now())
            .await
            .unwrap();
        assert_eq!(id, 42);

        let conn = open(&path).unwrap();
        let max: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM t_iot_telemetry", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max, None, "other tables keep their own sequence");
    }

    #[tokio::test]
    async fn test_list_respects_limit_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("fleet.db")).unwrap();

        for (entity, at) in [
            (2, "2024-05-01 10:00:02"),
            (3, "2024-05-01 10:00:03"),
            (1, "2024-05-01 10:00:01"),
        ] {
            let payload = Payload::from(NewTelemetry::new(entity, 35.0, 0.1, 70.0));
            store.insert(&payload, ts(at)).await.unwrap();
        }

        let rows = store.list(Kind::Telemetry, 2).await.unwrap();
        let entities: Vec<_> = rows.iter().map(|r| r.entity_id().unwrap()).collect();
        assert_eq!(entities, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_primary_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("missing").join("fleet.db")).unwrap();

        let payload = Payload::from(NewTelemetry::new(1, 30.0, 0.0, 90.0));
        let err = store.insert(&payload, Timestamp::now()).await.unwrap_err();
        assert!(err.is_primary_unavailable());

        let err = store.list(Kind::Telemetry, 5).await.unwrap_err();
        assert!(err.is_primary_unavailable());
    }

    #[tokio::test]
    async fn test_store_recovers_once_database_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = dir.path().join("later");
        let store = SqliteStore::new(db_dir.join("fleet.db")).unwrap();
        let payload = Payload::from(NewTelemetry::new(1, 30.0, 0.0, 90.0));

        assert!(store.insert(&payload, Timestamp::now()).await.is_err());
        std::fs::create_dir(&db_dir).unwrap();
        assert_eq!(store.insert(&payload, Timestamp::now()).await.unwrap(), 1);
    }
}
