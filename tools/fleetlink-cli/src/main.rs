//! FleetLink CLI - ingestion gateway and fleet inspection
//!
//! `fleetlink serve` subscribes to the vehicle telemetry and command topics
//! and stores every message in the primary store, falling back to the durable
//! CSV log when the primary is unavailable. The other commands read and
//! write the same stores directly.

use clap::{Parser, Subcommand};
use commands::{
    list::ListCommand, live::LiveCommand, record::RecordCommand, relay::RelayCommand,
    serve::ServeCommand,
};
use config::{BusSettings, StoreSettings};
use context::FleetContext;

mod commands;
mod config;
mod context;
mod error;
mod output;

const DEFAULT_LOG_FILTER: &str =
    "fleetlink=info,fleetlink_core=info,fleetlink_csvlog=info,fleetlink_sqlite=info,fleetlink_mqtt_connector=info";

/// FleetLink - vehicle telemetry gateway
#[derive(Debug, Parser)]
#[command(name = "fleetlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    store: StoreSettings,

    #[command(flatten)]
    bus: BusSettings,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bus ingestion loop until Ctrl+C
    #[command(name = "serve")]
    Serve(ServeCommand),

    /// Store a telemetry, command or detection record
    #[command(name = "record")]
    Record(RecordCommand),

    /// List the most recent records of a kind
    #[command(name = "list")]
    List(ListCommand),

    /// Show the latest state of every vehicle
    #[command(name = "live")]
    Live(LiveCommand),

    /// Publish a command to a vehicle
    #[command(name = "relay")]
    Relay(RelayCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    let ctx = match FleetContext::open(&cli.store, &cli.bus).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Serve(cmd) => cmd.execute(&ctx).await,
        Command::Record(cmd) => cmd.execute(&ctx).await,
        Command::List(cmd) => cmd.execute(&ctx).await,
        Command::Live(cmd) => cmd.execute(&ctx).await,
        Command::Relay(cmd) => cmd.execute(&ctx).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{BackendKind, Kind, NewTelemetry, Payload};

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["fleetlink", "list", "telemetry"]).unwrap();
        assert_eq!(cli.bus.namespace, "mottu");
        assert_eq!(cli.bus.entity_type, "motos");
        assert_eq!(cli.bus.port, 1883);
        match cli.command {
            Command::List(cmd) => {
                assert_eq!(cmd.kind, Kind::Telemetry);
                assert_eq!(cmd.limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_credentials_need_both_flags() {
        let cli = Cli::try_parse_from([
            "fleetlink", "relay", "--entity", "7", "--kind", "lock", "--username", "fleet",
        ])
        .unwrap();
        assert_eq!(cli.bus.mqtt_config().credentials(), None);

        let cli = Cli::try_parse_from([
            "fleetlink", "relay", "--entity", "7", "--kind", "lock", "--username", "fleet",
            "--password", "s3cret",
        ])
        .unwrap();
        assert_eq!(cli.bus.mqtt_config().credentials(), Some(("fleet", "s3cret")));
    }

    #[test]
    fn test_detection_bbox() {
        let cli = Cli::try_parse_from([
            "fleetlink", "record", "detection", "--source", "cam-1", "--label", "moto", "--conf",
            "0.9", "--bbox", "1,2,30,40",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Record(_)));

        assert!(Cli::try_parse_from(["fleetlink", "list", "alarms"]).is_err());
    }

    #[tokio::test]
    async fn test_context_falls_back_when_primary_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let db_path = dir.path().join("offline").join("fleet.db");
        let cli = Cli::try_parse_from([
            "fleetlink",
            "live",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--db-path",
            db_path.to_str().unwrap(),
        ])
        .unwrap();

        let ctx = FleetContext::open(&cli.store, &cli.bus).await.unwrap();
        let saved = ctx
            .persistence
            .save(&Payload::from(NewTelemetry::new(7, 41.5, 0.4, 88.0)))
            .await
            .unwrap();
        assert_eq!(saved.backend, BackendKind::DurableLog);
        assert!(data_dir.join("telemetry.csv").exists());
        assert!(!ctx.ingestion.is_started());
    }
}
