//! Global settings: flags with environment fallbacks.

use std::path::PathBuf;

use clap::Args;
use fleetlink_mqtt_connector::config::{DEFAULT_ENTITY_TYPE, DEFAULT_NAMESPACE, DEFAULT_PORT};
use fleetlink_mqtt_connector::{MqttConfig, TopicScheme};

/// Where records are stored.
#[derive(Debug, Clone, Args)]
pub struct StoreSettings {
    /// Directory holding the durable CSV logs
    #[arg(long, env = "FLEETLINK_DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// SQLite database used as the primary store
    #[arg(long, env = "FLEETLINK_DB_PATH", default_value = "./data/fleet.db", global = true)]
    pub db_path: PathBuf,
}

/// How to reach the broker and which topics to use.
#[derive(Debug, Clone, Args)]
pub struct BusSettings {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost", global = true)]
    pub broker: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// MQTT username (used only together with a password)
    #[arg(long, env = "MQTT_USERNAME", global = true)]
    pub username: Option<String>,

    /// MQTT password
    #[arg(long, env = "MQTT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// MQTT client id (random when omitted)
    #[arg(long, env = "MQTT_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// First topic segment
    #[arg(long, env = "FLEETLINK_NAMESPACE", default_value = DEFAULT_NAMESPACE, global = true)]
    pub namespace: String,

    /// Second topic segment
    #[arg(long, env = "FLEETLINK_ENTITY_TYPE", default_value = DEFAULT_ENTITY_TYPE, global = true)]
    pub entity_type: String,
}

impl BusSettings {
    pub fn mqtt_config(&self) -> MqttConfig {
        let mut config = MqttConfig::new(self.broker.clone(), self.port);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            config = config.with_credentials(user.clone(), pass.clone());
        }
        if let Some(id) = &self.client_id {
            config = config.with_client_id(id.clone());
        }
        config
    }

    pub fn topics(&self) -> TopicScheme {
        TopicScheme::new(self.namespace.clone(), self.entity_type.clone())
    }
}
