//! Bus transport abstraction and its `rumqttc` implementation
//!
//! The ingestion loop and the command relay only see [`BusClient`] (outbound
//! requests) and [`EventSource`] (inbound events). [`connect`] builds both
//! halves for a real broker; tests plug in channel-backed fakes.

use std::sync::Arc;
use std::time::Duration;

use fleetlink_core::BoxFuture;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};

use crate::config::MqttConfig;
use crate::error::{BusError, BusResult};

/// Wait before polling again after a transport error.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Inbound transport events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Broker acknowledged a (re)connect; subscriptions must be renewed.
    Connected,
    Message { topic: String, payload: Vec<u8> },
    /// Connection lost; the transport reconnects on its own.
    Disconnected(String),
}

/// Outbound half of a connection.
pub trait BusClient: Send + Sync {
    fn subscribe<'a>(&'a self, filter: &'a str) -> BoxFuture<'a, BusResult<()>>;

    fn publish<'a>(&'a self, topic: &'a str, payload: Vec<u8>) -> BoxFuture<'a, BusResult<()>>;

    fn disconnect(&self) -> BoxFuture<'_, BusResult<()>>;
}

/// Inbound half of a connection.
pub trait EventSource: Send {
    /// Next event, or `None` once the connection is closed for good.
    fn next_event(&mut self) -> BoxFuture<'_, Option<BusEvent>>;
}

/// Both halves of one broker connection.
pub struct Connection {
    pub client: Arc<dyn BusClient>,
    pub events: Box<dyn EventSource>,
}

// ---------------------------------------------------------------------------
// rumqttc
// ---------------------------------------------------------------------------

/// Builds a `rumqttc` connection. Nothing touches the network until the
/// event source is polled.
pub fn connect(config: &MqttConfig) -> Connection {
    let mut mqtt_opts = MqttOptions::new(
        config.client_id_or_random(),
        config.host.clone(),
        config.port,
    );
    mqtt_opts.set_keep_alive(config.keep_alive);

    if let Some((username, password)) = config.credentials() {
        mqtt_opts.set_credentials(username, password);
    }

    let (client, event_loop) = AsyncClient::new(mqtt_opts, config.capacity);

    #[cfg(feature = "tracing")]
    tracing::info!("Created MQTT client for {}", config.broker_key());

    Connection {
        client: Arc::new(RumqttcClient {
            client,
            broker: config.broker_key(),
        }),
        events: Box::new(RumqttcEvents {
            event_loop,
            broker: config.broker_key(),
            closed: false,
        }),
    }
}

struct RumqttcClient {
    client: AsyncClient,
    broker: String,
}

impl BusClient for RumqttcClient {
    fn subscribe<'a>(&'a self, filter: &'a str) -> BoxFuture<'a, BusResult<()>> {
        Box::pin(async move {
            self.client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(|e| BusError::subscribe(filter, e))
        })
    }

    fn publish<'a>(&'a self, topic: &'a str, payload: Vec<u8>) -> BoxFuture<'a, BusResult<()>> {
        Box::pin(async move {
            self.client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|e| BusError::publish(topic, e))
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, BusResult<()>> {
        Box::pin(async move {
            self.client
                .disconnect()
                .await
                .map_err(|e| BusError::connect(self.broker.as_str(), e))
        })
    }
}

struct RumqttcEvents {
    event_loop: EventLoop,
    broker: String,
    closed: bool,
}

impl EventSource for RumqttcEvents {
    fn next_event(&mut self) -> BoxFuture<'_, Option<BusEvent>> {
        Box::pin(async move {
            if self.closed {
                return None;
            }
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!("Connected to MQTT broker {}", self.broker);
                        return Some(BusEvent::Connected);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        return Some(BusEvent::Message {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                        });
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        self.closed = true;
                        return None;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!("MQTT event loop error for {}: {:?}", self.broker, e);

                        tokio::time::sleep(RECONNECT_DELAY).await;
                        return Some(BusEvent::Disconnected(e.to_string()));
                    }
                }
            }
        })
    }
}
