//! Persistence façade: primary store first, durable log on any failure.
//!
//! Every call makes exactly one attempt against the primary backend. If that
//! attempt fails for any reason the durable log serves the call instead and
//! the outcome is tagged [`BackendKind::DurableLog`]. Only a durable-log
//! failure is returned as an error.
//!
//! `list` is backend-exclusive: while the primary is healthy, records written
//! to the durable log during an earlier outage are not visible through it.

use std::sync::Arc;

use serde::Serialize;

use crate::backend::{BackendKind, StoreBackend};
use crate::error::{StoreError, StoreResult};
use crate::kind::Kind;
use crate::record::{Payload, Record};
use crate::time::Timestamp;

/// A value together with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub backend: BackendKind,
    pub value: T,
}

impl<T> Served<T> {
    pub fn new(backend: BackendKind, value: T) -> Self {
        Self { backend, value }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            backend: self.backend,
            value: f(self.value),
        }
    }
}

/// Single entry point for reads and writes.
///
/// Holds no state of its own besides the two backends, so it is shared as
/// `Arc<Persistence>` between the ingestion loop and request handlers.
#[derive(Clone)]
pub struct Persistence {
    primary: Arc<dyn StoreBackend>,
    durable: Arc<dyn StoreBackend>,
}

impl Persistence {
    pub fn new(primary: Arc<dyn StoreBackend>, durable: Arc<dyn StoreBackend>) -> Self {
        Self { primary, durable }
    }

    /// Store `payload` stamped with the current local time.
    pub async fn save(&self, payload: &Payload) -> StoreResult<Served<u64>> {
        self.save_at(payload, Timestamp::now()).await
    }

    /// Store `payload` with an explicit timestamp.
    pub async fn save_at(&self, payload: &Payload, at: Timestamp) -> StoreResult<Served<u64>> {
        let kind = payload.kind();
        match self.primary.insert(payload, at).await {
            Ok(id) => Ok(Served::new(BackendKind::Primary, id)),
            Err(primary_err) => {
                log_fallback("save", kind, &primary_err);
                let id = self.durable.insert(payload, at).await?;
                Ok(Served::new(BackendKind::DurableLog, id))
            }
        }
    }

    /// Most recent `limit` records of `kind`, newest first.
    pub async fn list(&self, kind: Kind, limit: usize) -> StoreResult<Served<Vec<Record>>> {
        match self.primary.list(kind, limit).await {
            Ok(items) => Ok(Served::new(BackendKind::Primary, items)),
            Err(primary_err) => {
                log_fallback("list", kind, &primary_err);
                let items = self.durable.list(kind, limit).await?;
                Ok(Served::new(BackendKind::DurableLog, items))
            }
        }
    }
}

fn log_fallback(_operation: &str, _kind: Kind, _err: &StoreError) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        "{} {}: primary store failed, using durable log ({})",
        _operation,
        _kind,
        _err
    );
}
