//! List Command - most recent records of one kind

use clap::Args;
use colored::Colorize;
use fleetlink_core::Kind;

use crate::context::FleetContext;
use crate::error::CliResult;
use crate::output::{backend_label, json, table, OutputFormat};

/// Show the most recent records of a kind, newest first
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Record kind: telemetry, command or detection
    pub kind: Kind,

    /// Maximum number of records
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, ctx: &FleetContext) -> CliResult<()> {
        let served = ctx.persistence.list(self.kind, self.limit).await?;

        let output = match self.format {
            OutputFormat::Table => format!(
                "{}\n{} {}",
                table::format_records_table(self.kind, &served.value),
                "served by".dimmed(),
                backend_label(served.backend)
            ),
            OutputFormat::Json => json::format_json(&served, true)?,
            OutputFormat::JsonCompact => json::format_json(&served, false)?,
        };

        println!("{}", output);
        Ok(())
    }
}
