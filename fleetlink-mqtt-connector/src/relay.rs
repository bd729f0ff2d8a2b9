//! Outbound actuator commands.
//!
//! The relay only publishes. The command is persisted when it comes back in
//! on the commands filter, like a command from any other producer.

use std::sync::Arc;

use fleetlink_core::NewCommand;

use crate::config::{Route, TopicScheme};
use crate::error::{BusError, BusResult};
use crate::transport::BusClient;

pub struct CommandRelay {
    client: Arc<dyn BusClient>,
    topics: TopicScheme,
}

impl CommandRelay {
    pub fn new(client: Arc<dyn BusClient>, topics: TopicScheme) -> Self {
        Self { client, topics }
    }

    /// Publishes `command` to its vehicle's command topic and returns the
    /// topic it went to.
    pub async fn send(&self, command: &NewCommand) -> BusResult<String> {
        let topic = self.topics.topic(command.entity_id, Route::Commands);
        let body = serde_json::to_vec(command).map_err(|e| BusError::publish(topic.as_str(), e))?;
        self.client.publish(&topic, body).await?;

        #[cfg(feature = "tracing")]
        tracing::info!("Relayed '{}' to {}", command.kind, topic);

        Ok(topic)
    }
}
