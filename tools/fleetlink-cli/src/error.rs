//! CLI Error Types

use fleetlink_core::StoreError;
use fleetlink_mqtt_connector::BusError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors with actionable messages
#[derive(Debug, Error)]
pub enum CliError {
    /// Both the primary store and the durable log failed
    #[error("Storage error: {0}\n  Hint: Check that the data directory is writable")]
    Store(#[from] StoreError),

    /// Broker interaction failed
    #[error("MQTT error: {0}\n  Hint: Check MQTT_BROKER / MQTT_PORT and that the broker is running")]
    Bus(#[from] BusError),

    /// A flag or input file could not be used
    #[error("Invalid {what}: {reason}")]
    InvalidInput { what: String, reason: String },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn invalid_input(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidInput {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}
