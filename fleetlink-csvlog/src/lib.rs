//! # fleetlink-csvlog
//!
//! Durable log backend for FleetLink: one append-only CSV file per record
//! kind inside a data directory. It is the last line of defense when the
//! primary store is down, so it stays simple: no index, no
//! rewrite, no rotation.
//!
//! - **Ids**: the id of a new record is the number of lines already in the
//!   file, header included. An empty log gets its header and id 1, then 2, 3,
//!   and so on.
//! - **Appends**: serialized per kind by an async mutex, so concurrent
//!   fallback writes never compute the same id. Separate processes sharing a
//!   directory are not coordinated.
//! - **Reads**: `tail` reads the whole file and needs no lock; a concurrent
//!   reader sees some prefix of the log. Only newline-terminated rows are
//!   read, and undecodable rows are skipped.
//! - **Torn rows**: a final line without its newline was cut short by a
//!   crash. The next append ends it with [`TORN_MARKER`], which keeps it
//!   from ever decoding, and the line still counts towards the id.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetlink_csvlog::CsvLog;
//! use std::sync::Arc;
//!
//! let durable = Arc::new(CsvLog::open("./data").await?);
//! ```

pub mod codec;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fleetlink_core::backend::{BoxFuture, StoreBackend};
use fleetlink_core::{Kind, Payload, Record, StoreError, StoreResult, Timestamp};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appended to a torn final line before the next record is written. The last
/// column of every kind is a timestamp, so the marked line never decodes.
pub const TORN_MARKER: &str = ",#torn";

/// Append-only CSV log, one file per [`Kind`].
pub struct CsvLog {
    dir: PathBuf,
    /// One writer lock per kind, indexed by [`Kind::index`].
    append_locks: [Mutex<()>; 3],
}

impl CsvLog {
    /// Opens the log rooted at `dir`, creating the directory if needed.
    /// Log files themselves are created lazily by the first append.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::log_io(&dir, e))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Durable log opened at {}", dir.display());

        Ok(Self {
            dir,
            append_locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file holding `kind`.
    pub fn path_for(&self, kind: Kind) -> PathBuf {
        self.dir.join(kind.log_file())
    }

    /// Appends `payload` stamped with `at` and returns its id.
    ///
    /// I/O failures are returned as-is; nothing is retried.
    pub async fn append(&self, payload: &Payload, at: Timestamp) -> StoreResult<u64> {
        let kind = payload.kind();
        let path = self.path_for(kind);
        let _guard = self.append_locks[kind.index()].lock().await;

        let existing = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::log_io(&path, e)),
        };
        let lines = codec::count_lines(&existing);

        let mut chunk = String::new();
        let id = if lines == 0 {
            chunk.push_str(&codec::header_line(kind));
            chunk.push('\n');
            1
        } else {
            if let Some(_torn) = torn_tail(&existing) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Marking torn row in {}: {:?}",
                    path.display(),
                    String::from_utf8_lossy(_torn)
                );
                chunk.push_str(TORN_MARKER);
                chunk.push('\n');
            }
            lines as u64
        };
        chunk.push_str(&codec::encode_record(&payload.to_record(id, at)));
        chunk.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::log_io(&path, e))?;
        file.write_all(chunk.as_bytes())
            .await
            .map_err(|e| StoreError::log_io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::log_io(&path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::log_io(&path, e))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Appended {} #{} to {}", kind, id, path.display());

        Ok(id)
    }

    /// Returns at most `limit` records of `kind`, newest first.
    ///
    /// Records with equal timestamps keep their file order. A missing log
    /// yields an empty list. A final line without its newline is either
    /// being written or torn, and is left out.
    pub async fn tail(&self, kind: Kind, limit: usize) -> StoreResult<Vec<Record>> {
        let path = self.path_for(kind);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::log_io(&path, e)),
        };
        let complete = match torn_tail(&bytes) {
            Some(torn) => &bytes[..bytes.len() - torn.len()],
            None => &bytes[..],
        };
        let content = String::from_utf8_lossy(complete);
        let header = codec::header_line(kind);

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if (idx == 0 && line == header) || line.trim().is_empty() {
                continue;
            }
            match codec::decode_row(kind, line, idx + 1) {
                Ok(record) => records.push(record),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Skipping row in {}: {}", path.display(), _e);
                }
            }
        }

        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        records.truncate(limit);
        Ok(records)
    }
}

/// The unterminated final segment of a log, if any.
fn torn_tail(bytes: &[u8]) -> Option<&[u8]> {
    match bytes.last() {
        None | Some(b'\n') => None,
        Some(_) => {
            let start = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
            Some(&bytes[start..])
        }
    }
}

impl StoreBackend for CsvLog {
    fn insert<'a>(&'a self, payload: &'a Payload, at: Timestamp) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(self.append(payload, at))
    }

    fn list(&self, kind: Kind, limit: usize) -> BoxFuture<'_, StoreResult<Vec<Record>>> {
        Box::pin(self.tail(kind, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{NewCommand, NewTelemetry};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn telemetry(entity: u64) -> Payload {
        Payload::from(NewTelemetry::new(entity, 40.0, 0.5, 80.0))
    }

    #[tokio::test]
    async fn test_sequential_ids_follow_line_count() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();

        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(log.append(&telemetry(n + 1), Timestamp::now()).await.unwrap());
        }

        // id = lines already present (header + n previous rows) = 1 + n
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let content = std::fs::read_to_string(log.path_for(Kind::Telemetry)).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("id,id_moto,temp_c,vib,batt_pct,ts"));
        assert_eq!(lines.count(), 5);
    }

    #[tokio::test]
    async fn test_kinds_have_independent_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();

        assert_eq!(log.append(&telemetry(1), Timestamp::now()).await.unwrap(), 1);
        assert_eq!(log.append(&telemetry(1), Timestamp::now()).await.unwrap(), 2);
        let cmd = Payload::from(NewCommand::new(1, "lock"));
        assert_eq!(log.append(&cmd, Timestamp::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tail_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();

        log.append(&telemetry(2), ts("2024-05-01 10:00:02")).await.unwrap();
        log.append(&telemetry(3), ts("2024-05-01 10:00:03")).await.unwrap();
        log.append(&telemetry(1), ts("2024-05-01 10:00:01")).await.unwrap();

        let tail = log.tail(Kind::Telemetry, 2).await.unwrap();
        let entities: Vec<_> = tail.iter().map(|r| r.entity_id().unwrap()).collect();
        assert_eq!(entities, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_tail_of_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();
        assert!(log.tail(Kind::Detection, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_torn_tail_line_is_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();
        log.append(&telemetry(1), ts("2024-05-01 10:00:00")).await.unwrap();

        // Simulate a crash mid-write.
        let path = log.path_for(Kind::Telemetry);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("2,9,41.");
        std::fs::write(&path, content).unwrap();

        let id = log.append(&telemetry(4), ts("2024-05-01 10:00:05")).await.unwrap();
        assert_eq!(id, 3);

        let tail = log.tail(Kind::Telemetry, 10).await.unwrap();
        let ids: Vec<_> = tail.iter().map(Record::id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_row_torn_inside_timestamp_never_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();
        log.append(&telemetry(1), ts("2024-05-01 10:00:00")).await.unwrap();

        // Cut inside the seconds: "10:00:5" would parse as 10:00:05.
        let path = log.path_for(Kind::Telemetry);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("2,9,41.5,0.4,88,2024-05-01 10:00:5");
        std::fs::write(&path, content).unwrap();

        let tail = log.tail(Kind::Telemetry, 10).await.unwrap();
        let ids: Vec<_> = tail.iter().map(Record::id).collect();
        assert_eq!(ids, vec![1]);

        let id = log.append(&telemetry(4), ts("2024-05-01 10:00:07")).await.unwrap();
        assert_eq!(id, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let marked = format!("2,9,41.5,0.4,88,2024-05-01 10:00:5{}", TORN_MARKER);
        assert!(content.lines().any(|l| l == marked));

        let tail = log.tail(Kind::Telemetry, 10).await.unwrap();
        let ids: Vec<_> = tail.iter().map(Record::id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_torn_tail_detection() {
        assert_eq!(torn_tail(b""), None);
        assert_eq!(torn_tail(b"id\n1\n"), None);
        assert_eq!(torn_tail(b"id\n1\n2,9"), Some(&b"2,9"[..]));
        assert_eq!(torn_tail(b"id,ts"), Some(&b"id,ts"[..]));
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLog::open(dir.path()).await.unwrap();
        // A directory squatting on the log file path makes every append fail.
        std::fs::create_dir(log.path_for(Kind::Telemetry)).unwrap();

        let err = log.append(&telemetry(1), Timestamp::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::LogIo { .. }));
    }
}
