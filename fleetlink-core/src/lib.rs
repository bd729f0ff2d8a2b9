//! # fleetlink-core
//!
//! Shared building blocks for FleetLink: the record model for vehicle
//! telemetry, actuator commands and vision detections, the
//! [`StoreBackend`] trait implemented by the storage crates, the
//! [`Persistence`] façade that routes every write to the primary store and
//! falls back to the durable log, and the live-state aggregator that folds
//! recent telemetry into one reading per vehicle.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fleetlink_core::{Kind, NewTelemetry, Payload, Persistence};
//! use fleetlink_csvlog::CsvLog;
//! use fleetlink_sqlite::SqliteStore;
//! use std::sync::Arc;
//!
//! let primary = Arc::new(SqliteStore::new("./data/fleet.db")?);
//! let durable = Arc::new(CsvLog::open("./data").await?);
//! let persistence = Persistence::new(primary, durable);
//!
//! let saved = persistence
//!     .save(&Payload::Telemetry(NewTelemetry::new(7, 41.5, 0.4, 88.0)))
//!     .await?;
//! println!("stored #{} in {}", saved.value, saved.backend);
//!
//! let recent = persistence.list(Kind::Telemetry, 50).await?;
//! let live = fleetlink_core::live_state::latest_from_records(&recent.value);
//! ```

pub mod backend;
pub mod error;
pub mod kind;
pub mod live_state;
pub mod persistence;
pub mod record;
pub mod time;
pub mod value;

pub use backend::{BackendKind, BoxFuture, StoreBackend};
pub use error::{StoreError, StoreResult};
pub use kind::{Kind, ParseKindError};
pub use live_state::{latest_by_entity, Reading, VehicleStatus};
pub use persistence::{Persistence, Served};
pub use record::{
    CommandRecord, DetectionRecord, NewCommand, NewDetection, NewTelemetry, Payload, Record,
    TelemetryRecord,
};
pub use time::Timestamp;
