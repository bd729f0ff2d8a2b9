//! Process-wide wiring built once at startup.

use std::sync::Arc;

use fleetlink_core::Persistence;
use fleetlink_csvlog::CsvLog;
use fleetlink_mqtt_connector::{transport, IngestionService, MqttConfig, TopicScheme};
use fleetlink_sqlite::SqliteStore;

use crate::config::{BusSettings, StoreSettings};
use crate::error::CliResult;

/// Everything a command needs: the persistence façade, the ingestion
/// service and the broker settings.
pub struct FleetContext {
    pub persistence: Persistence,
    pub ingestion: IngestionService,
    pub mqtt: MqttConfig,
    pub topics: TopicScheme,
}

impl FleetContext {
    pub async fn open(store: &StoreSettings, bus: &BusSettings) -> CliResult<Self> {
        let primary = Arc::new(SqliteStore::new(&store.db_path)?);
        let durable = Arc::new(CsvLog::open(&store.data_dir).await?);

        tracing::debug!(
            "Primary store {}, durable log in {}",
            primary.path().display(),
            durable.dir().display()
        );

        let persistence = Persistence::new(primary, durable);
        let topics = bus.topics();

        Ok(Self {
            ingestion: IngestionService::new(persistence.clone(), topics.clone()),
            persistence,
            mqtt: bus.mqtt_config(),
            topics,
        })
    }

    /// Starts bus ingestion; a second call is a no-op.
    pub fn start_ingestion(&self) -> bool {
        self.ingestion.start(|| transport::connect(&self.mqtt))
    }
}
