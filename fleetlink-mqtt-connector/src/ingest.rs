//! Bus ingestion loop
//!
//! [`IngestionService`] owns one background task that subscribes to the
//! telemetry and command filters of a [`TopicScheme`], decodes every message
//! and saves it through the [`Persistence`] façade.
//!
//! - Subscriptions are renewed on every `Connected` event, so a broker
//!   restart does not silently stop ingestion.
//! - A malformed message is logged and dropped; the loop keeps running.
//! - `start` is idempotent: only the first call connects.
//! - `shutdown` stops taking new messages; one already taken off the
//!   transport is persisted before the task exits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use fleetlink_core::value::{lenient_f64, lenient_string, lenient_u64};
use fleetlink_core::{BackendKind, NewCommand, NewTelemetry, Payload, Persistence, Served};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{Route, TopicScheme};
use crate::error::{IngestError, IngestResult};
use crate::transport::{BusClient, BusEvent, Connection, EventSource};

/// Command kind stored when a command message carries none.
pub const UNKNOWN_COMMAND_KIND: &str = "unknown";

// ---------------------------------------------------------------------------
// Message mapping
// ---------------------------------------------------------------------------

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> IngestResult<&'a Value> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(IngestError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_u64(obj: &Map<String, Value>, field: &'static str) -> IngestResult<u64> {
    let value = required(obj, field)?;
    lenient_u64(value).ok_or_else(|| IngestError::invalid_field(field, value))
}

fn required_f64(obj: &Map<String, Value>, field: &'static str) -> IngestResult<f64> {
    let value = required(obj, field)?;
    lenient_f64(value).ok_or_else(|| IngestError::invalid_field(field, value))
}

/// Maps a telemetry message body (`id_moto`, `temp_c`, `vib`, `batt_pct`).
pub fn telemetry_from(obj: &Map<String, Value>) -> IngestResult<NewTelemetry> {
    Ok(NewTelemetry::new(
        required_u64(obj, "id_moto")?,
        required_f64(obj, "temp_c")?,
        required_f64(obj, "vib")?,
        required_f64(obj, "batt_pct")?,
    ))
}

/// Maps a command message body. Only `id_moto` is required.
pub fn command_from(obj: &Map<String, Value>) -> IngestResult<NewCommand> {
    let entity_id = required_u64(obj, "id_moto")?;
    let kind = obj
        .get("kind")
        .and_then(lenient_string)
        .unwrap_or_else(|| UNKNOWN_COMMAND_KIND.to_string());

    let mut command = NewCommand::new(entity_id, kind);
    command.reason = obj.get("reason").and_then(lenient_string);
    Ok(command)
}

/// Turns a raw bus message into a storable payload.
pub fn decode_message(topic: &str, payload: &[u8]) -> IngestResult<Payload> {
    let route = Route::from_topic(topic).ok_or_else(|| IngestError::UnroutedTopic(topic.to_string()))?;
    let body: Value = serde_json::from_slice(payload)?;
    let obj = body.as_object().ok_or(IngestError::NotAnObject)?;

    match route {
        Route::Telemetry => telemetry_from(obj).map(Payload::from),
        Route::Commands => command_from(obj).map(Payload::from),
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Message counters since the service was created.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    primary: AtomicU64,
    fallback: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    /// Saved by the primary store
    pub primary: u64,
    /// Saved by the durable log
    pub fallback: u64,
    /// Malformed, unrouted or failed to persist
    pub dropped: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            primary: self.primary.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record_saved(&self, backend: BackendKind) {
        let counter = match backend {
            BackendKind::Primary => &self.primary,
            BackendKind::DurableLog => &self.fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// State shared between the service handle and its task.
struct Shared {
    persistence: Persistence,
    topics: TopicScheme,
    stats: IngestStats,
}

impl Shared {
    async fn ingest(&self, topic: &str, payload: &[u8]) -> IngestResult<Served<u64>> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let outcome = match decode_message(topic, payload) {
            Ok(decoded) => self
                .persistence
                .save(&decoded)
                .await
                .map(|served| (decoded, served))
                .map_err(IngestError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((_decoded, served)) => {
                self.stats.record_saved(served.backend);
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "Saved {} for entity {:?} as #{} ({})",
                    _decoded.kind(),
                    _decoded.entity_id(),
                    served.value,
                    served.backend
                );
                Ok(served)
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                if e.is_malformed() {
                    tracing::warn!("Dropped message on '{}': {}", topic, e);
                } else {
                    tracing::error!("Failed to persist message on '{}': {}", topic, e);
                }
                Err(e)
            }
        }
    }

    async fn subscribe_all(&self, client: &dyn BusClient) {
        for filter in self.topics.subscriptions() {
            match client.subscribe(&filter).await {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!("Subscribed to {}", filter);
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("{}", _e);
                }
            }
        }
    }
}

/// Background ingestion of bus messages into the persistence façade.
pub struct IngestionService {
    shared: Arc<Shared>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionService {
    pub fn new(persistence: Persistence, topics: TopicScheme) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                persistence,
                topics,
                stats: IngestStats::default(),
            }),
            started: AtomicBool::new(false),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Connects through `connect` and spawns the ingestion task.
    ///
    /// Returns `false` without calling `connect` if the service was already
    /// started. Must be called from within a Tokio runtime.
    pub fn start<F>(&self, connect: F) -> bool
    where
        F: FnOnce() -> Connection,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Ingestion already started, ignoring");
            return false;
        }

        let Connection { client, events } = connect();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(run(self.shared.clone(), client, events, shutdown_rx));

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Stops the task and waits for the in-flight message, if any.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Ingests one message directly, bypassing the transport.
    pub async fn ingest(&self, topic: &str, payload: &[u8]) -> IngestResult<Served<u64>> {
        self.shared.ingest(topic, payload).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.shared.topics
    }
}

async fn run(
    shared: Arc<Shared>,
    client: Arc<dyn BusClient>,
    mut events: Box<dyn EventSource>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    #[cfg(feature = "tracing")]
    tracing::info!("Ingestion loop started");

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            event = events.next_event() => event,
        };

        match event {
            Some(BusEvent::Connected) => shared.subscribe_all(client.as_ref()).await,
            Some(BusEvent::Message { topic, payload }) => {
                // Errors are logged and counted inside; the loop never stops on them.
                let _ = shared.ingest(&topic, &payload).await;
            }
            Some(BusEvent::Disconnected(_reason)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Bus disconnected: {}", _reason);
            }
            None => break,
        }
    }

    let _ = client.disconnect().await;

    #[cfg(feature = "tracing")]
    tracing::info!("Ingestion loop stopped");
}
