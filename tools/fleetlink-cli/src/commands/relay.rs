//! Relay Command - publish an actuator command to a vehicle

use std::time::Duration;

use clap::Args;
use colored::Colorize;
use fleetlink_core::NewCommand;
use fleetlink_mqtt_connector::{transport, BusError, BusEvent, CommandRelay};

use crate::context::FleetContext;
use crate::error::CliResult;

/// Publish a command on the vehicle's command topic
///
/// The command is stored by whichever `serve` instance receives it back.
#[derive(Debug, Args)]
pub struct RelayCommand {
    /// Vehicle id
    #[arg(long)]
    pub entity: u64,

    /// Command kind (lock, unlock, horn, led_on, led_off, ...)
    #[arg(long)]
    pub kind: String,

    /// Free-text reason
    #[arg(long)]
    pub reason: Option<String>,

    /// Seconds to wait for the broker to take the message
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

impl RelayCommand {
    pub async fn execute(self, ctx: &FleetContext) -> CliResult<()> {
        let mut command = NewCommand::new(self.entity, self.kind);
        command.reason = self.reason;

        let conn = transport::connect(&ctx.mqtt);
        let client = conn.client.clone();
        let mut events = conn.events;

        // The event loop has to run for the publish to leave the process.
        // It ends once the disconnect is sent, or on the first failure.
        let driver = tokio::spawn(async move {
            while let Some(event) = events.next_event().await {
                if let BusEvent::Disconnected(reason) = event {
                    return Err(reason);
                }
            }
            Ok(())
        });

        let relay = CommandRelay::new(client.clone(), ctx.topics.clone());
        let topic = relay.send(&command).await?;
        client.disconnect().await?;

        match tokio::time::timeout(Duration::from_secs(self.timeout), driver).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => return Err(BusError::connect(ctx.mqtt.broker_key(), reason).into()),
            Ok(Err(join_err)) => return Err(anyhow::Error::new(join_err).into()),
            Err(_) => {
                return Err(BusError::connect(
                    ctx.mqtt.broker_key(),
                    format!("no confirmation within {}s", self.timeout),
                )
                .into())
            }
        }

        println!("📤 Sent {} to {}", command.kind.bold(), topic);
        Ok(())
    }
}
