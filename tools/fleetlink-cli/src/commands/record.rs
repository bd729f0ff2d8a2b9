//! Record Commands - store a record through the persistence façade

use clap::Args;
use colored::Colorize;
use fleetlink_core::{NewCommand, NewDetection, NewTelemetry, Payload, Served};

use crate::context::FleetContext;
use crate::error::{CliError, CliResult};
use crate::output::{backend_label, json, OutputFormat};

/// Store a record (primary store, durable log on failure)
#[derive(Debug, Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub subcommand: RecordSubcommand,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, clap::Subcommand)]
pub enum RecordSubcommand {
    /// Store a telemetry reading
    Telemetry {
        /// Vehicle id
        #[arg(long)]
        entity: u64,

        /// Temperature in °C
        #[arg(long, allow_negative_numbers = true)]
        temp: f64,

        /// Vibration level
        #[arg(long)]
        vib: f64,

        /// Battery charge, 0-100
        #[arg(long)]
        battery: f64,
    },
    /// Store an actuator command
    Command {
        /// Vehicle id
        #[arg(long)]
        entity: u64,

        /// Command kind (lock, unlock, horn, ...)
        #[arg(long)]
        kind: String,

        /// Free-text reason
        #[arg(long)]
        reason: Option<String>,
    },
    /// Store a vision detection
    Detection {
        /// Detector source tag
        #[arg(long)]
        source: String,

        /// Detected class label
        #[arg(long)]
        label: String,

        /// Confidence, 0.0-1.0
        #[arg(long)]
        conf: f64,

        /// Bounding box as x,y,w,h
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        bbox: Vec<i64>,

        /// Frame number
        #[arg(long)]
        frame: Option<i64>,

        /// Correlated vehicle id
        #[arg(long)]
        entity: Option<u64>,

        /// Yard region
        #[arg(long)]
        region: Option<String>,
    },
}

impl RecordSubcommand {
    fn into_payload(self) -> CliResult<Payload> {
        let payload = match self {
            RecordSubcommand::Telemetry {
                entity,
                temp,
                vib,
                battery,
            } => Payload::from(NewTelemetry::new(entity, temp, vib, battery)),
            RecordSubcommand::Command {
                entity,
                kind,
                reason,
            } => {
                let mut command = NewCommand::new(entity, kind);
                command.reason = reason;
                Payload::from(command)
            }
            RecordSubcommand::Detection {
                source,
                label,
                conf,
                bbox,
                frame,
                entity,
                region,
            } => {
                let [x, y, w, h]: [i64; 4] = bbox
                    .try_into()
                    .map_err(|_| CliError::invalid_input("bbox", "expected x,y,w,h"))?;
                let mut detection = NewDetection::new(source, label, conf, (x, y, w, h));
                detection.frame_id = frame;
                detection.entity_id = entity;
                detection.region = region;
                Payload::from(detection)
            }
        };
        Ok(payload)
    }
}

impl RecordCommand {
    pub async fn execute(self, ctx: &FleetContext) -> CliResult<()> {
        let payload = self.subcommand.into_payload()?;
        let served = ctx.persistence.save(&payload).await?;

        let output = match self.format {
            OutputFormat::Table => format_saved(&payload, &served),
            OutputFormat::Json => json::format_json(&served, true)?,
            OutputFormat::JsonCompact => json::format_json(&served, false)?,
        };
        println!("{}", output);
        Ok(())
    }
}

fn format_saved(payload: &Payload, served: &Served<u64>) -> String {
    format!(
        "✅ Stored {} #{} in {}",
        payload.kind().to_string().bold(),
        served.value,
        backend_label(served.backend)
    )
}
