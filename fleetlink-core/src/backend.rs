//! Storage backend trait for FleetLink.
//!
//! Defines the [`StoreBackend`] trait that both the primary store
//! (`fleetlink-sqlite`) and the durable log (`fleetlink-csvlog`) implement,
//! so the [`Persistence`](crate::Persistence) façade can drive either one
//! through the same contract.

use core::fmt;
use core::future::Future;
use core::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::kind::Kind;
use crate::record::{Payload, Record};
use crate::time::Timestamp;

/// Boxed future used by the backend trait (no `async_trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which backend served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Primary,
    DurableLog,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Primary => "primary",
            BackendKind::DurableLog => "durable_log",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pluggable record store.
///
/// Each backend keeps its own id sequence per [`Kind`]; ids are only unique
/// within one backend.
pub trait StoreBackend: Send + Sync {
    /// Persist `payload` stamped with `at` and return the id assigned to it.
    ///
    /// Either the record is fully stored or an error is returned; a failed
    /// call leaves nothing behind.
    fn insert<'a>(&'a self, payload: &'a Payload, at: Timestamp) -> BoxFuture<'a, StoreResult<u64>>;

    /// Return at most `limit` records of `kind`, newest first.
    fn list(&self, kind: Kind, limit: usize) -> BoxFuture<'_, StoreResult<Vec<Record>>>;
}
