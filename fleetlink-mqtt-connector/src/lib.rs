//! MQTT connector for FleetLink
//!
//! - **Inbound**: [`IngestionService`] subscribes to
//!   `{namespace}/{entity_type}/+/telemetry` and `.../+/commands` and saves
//!   every well-formed message through the persistence façade.
//! - **Outbound**: [`CommandRelay`] publishes actuator commands to
//!   `{namespace}/{entity_type}/{id}/commands`.
//!
//! Both sides talk to the broker through the [`BusClient`] / [`EventSource`]
//! pair; [`transport::connect`] provides the `rumqttc` implementation.
//!
//! ## Features
//!
//! - `tracing`: log subscriptions, saved and dropped messages (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetlink_mqtt_connector::{transport, IngestionService, MqttConfig, TopicScheme};
//!
//! let config = MqttConfig::from_url("mqtt://localhost:1883")?;
//! let ingestion = IngestionService::new(persistence, TopicScheme::default());
//! ingestion.start(|| transport::connect(&config));
//!
//! tokio::signal::ctrl_c().await?;
//! ingestion.shutdown().await;
//! println!("{:?}", ingestion.stats());
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod relay;
pub mod transport;

pub use config::{MqttConfig, Route, TopicScheme};
pub use error::{BusError, BusResult, IngestError, IngestResult};
pub use ingest::{IngestionService, StatsSnapshot};
pub use relay::CommandRelay;
pub use transport::{BusClient, BusEvent, Connection, EventSource};
