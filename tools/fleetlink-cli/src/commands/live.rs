//! Live Command - latest reading and status per vehicle

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use fleetlink_core::live_state::{latest_by_entity, normalize_rows, Reading};
use fleetlink_core::Kind;
use fleetlink_csvlog::codec::split_line;
use serde_json::{Map, Value};

use crate::context::FleetContext;
use crate::error::{CliError, CliResult};
use crate::output::{backend_label, json, table, OutputFormat};

/// Show the current state of every vehicle seen in recent telemetry
#[derive(Debug, Args)]
pub struct LiveCommand {
    /// How many recent telemetry records to fold
    #[arg(short, long, default_value = "200")]
    pub limit: usize,

    /// Also fold a simulator CSV (id_moto,temp_c,vib,batt_pct,zona,timestamp)
    #[arg(long)]
    pub simulator: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl LiveCommand {
    pub async fn execute(self, ctx: &FleetContext) -> CliResult<()> {
        let served = ctx.persistence.list(Kind::Telemetry, self.limit).await?;
        let mut readings: Vec<Reading> = served
            .value
            .iter()
            .filter_map(|r| r.as_telemetry())
            .map(Reading::from)
            .collect();

        if let Some(path) = &self.simulator {
            let rows = read_csv_rows(path).await?;
            readings.extend(normalize_rows(&rows));
        }

        let live = latest_by_entity(readings);

        let output = match self.format {
            OutputFormat::Table => format!(
                "{}\n{} {}",
                table::format_live_table(&live),
                "telemetry served by".dimmed(),
                backend_label(served.backend)
            ),
            OutputFormat::Json => json::format_live_json(&live, true)?,
            OutputFormat::JsonCompact => json::format_live_json(&live, false)?,
        };
        println!("{}", output);
        Ok(())
    }
}

/// Reads a headed CSV file into one JSON object per row, all values as
/// strings. Rows that do not split cleanly are skipped.
async fn read_csv_rows(path: &Path) -> CliResult<Vec<Map<String, Value>>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_csv_rows(&content)
        .map_err(|reason| CliError::invalid_input(format!("simulator file {}", path.display()), reason))
}

fn parse_csv_rows(content: &str) -> Result<Vec<Map<String, Value>>, String> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(line) => split_line(line)?,
        None => return Ok(Vec::new()),
    };

    let rows = lines
        .filter_map(|line| split_line(line).ok())
        .filter(|fields| fields.len() == header.len())
        .map(|fields| {
            header
                .iter()
                .map(|h| h.trim().to_string())
                .zip(fields.into_iter().map(Value::String))
                .collect()
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_rows_normalize() {
        let content = "id_moto,temp_c,vib,batt_pct,zona,timestamp\n\
                       7,41.5,0.4,88,A1,2024-05-01T10:00:00\n\
                       7,43.0,1.4,87,A2,2024-05-01T10:05:00\n\
                       8,61.0,0.0,90,B1,2024-05-01T10:01:00\n\
                       broken,row\n";

        let rows = parse_csv_rows(content).unwrap();
        assert_eq!(rows.len(), 3);

        let live = latest_by_entity(normalize_rows(&rows));
        assert_eq!(live.len(), 2);
        assert_eq!(live[&7].zone.as_deref(), Some("A2"));
        assert_eq!(live[&7].status().as_str(), "in_use");
        assert_eq!(live[&8].status().as_str(), "maintenance");
    }

    #[test]
    fn test_empty_file_has_no_rows() {
        assert!(parse_csv_rows("").unwrap().is_empty());
    }
}
