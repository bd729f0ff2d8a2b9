//! Error types for the bus transport and the ingestion pipeline

use fleetlink_core::StoreError;
use thiserror::Error;

/// Result type for transport operations
pub type BusResult<T> = Result<T, BusError>;

/// Result type for message ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised by the bus transport
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Subscribe to '{filter}' failed: {reason}")]
    Subscribe { filter: String, reason: String },

    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Connection to {broker} failed: {reason}")]
    Connect { broker: String, reason: String },

    #[error("Invalid MQTT configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl BusError {
    pub fn subscribe(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::Subscribe {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    pub fn publish(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    pub fn connect(broker: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            broker: broker.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Why an inbound message was not persisted
///
/// Every variant except [`IngestError::Store`] concerns a single message;
/// the ingestion loop logs it, drops the message and carries on.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("no route for topic '{0}'")]
    UnroutedTopic(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn invalid_field(field: &'static str, value: &serde_json::Value) -> Self {
        Self::InvalidField {
            field,
            value: value.to_string(),
        }
    }

    /// True for errors caused by the message itself rather than storage.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
