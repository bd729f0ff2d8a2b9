//! Output Formatting

pub mod json;
pub mod table;

use colored::Colorize;
use fleetlink_core::BackendKind;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact JSON (one line)
    JsonCompact,
}

/// Backend tag, highlighted when the durable log had to step in.
pub fn backend_label(backend: BackendKind) -> String {
    match backend {
        BackendKind::Primary => backend.as_str().green().to_string(),
        BackendKind::DurableLog => backend.as_str().yellow().to_string(),
    }
}
