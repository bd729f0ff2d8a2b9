//! Record kinds and their fixed storage layouts.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three kinds of record FleetLink stores.
///
/// The kind selects the schema, the relational table and the durable log
/// file a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Telemetry,
    Command,
    Detection,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Telemetry, Kind::Command, Kind::Detection];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Telemetry => "telemetry",
            Kind::Command => "command",
            Kind::Detection => "detection",
        }
    }

    /// Column order of the durable log file. The first line of every log is
    /// exactly these names joined by commas.
    pub fn header(self) -> &'static [&'static str] {
        match self {
            Kind::Telemetry => &["id", "id_moto", "temp_c", "vib", "batt_pct", "ts"],
            Kind::Command => &["id", "id_moto", "kind", "reason", "ts"],
            Kind::Detection => &[
                "id", "source", "label", "conf", "x", "y", "w", "h", "frame_id", "id_moto",
                "region", "ts",
            ],
        }
    }

    /// File name of the durable log for this kind.
    pub fn log_file(self) -> &'static str {
        match self {
            Kind::Telemetry => "telemetry.csv",
            Kind::Command => "commands.csv",
            Kind::Detection => "detections.csv",
        }
    }

    /// Relational table backing this kind in the primary store.
    pub fn table(self) -> &'static str {
        match self {
            Kind::Telemetry => "t_iot_telemetry",
            Kind::Command => "t_iot_command",
            Kind::Detection => "t_iot_detection",
        }
    }

    /// Position of the kind inside [`Kind::ALL`]; used for per-kind slots.
    pub fn index(self) -> usize {
        match self {
            Kind::Telemetry => 0,
            Kind::Command => 1,
            Kind::Detection => 2,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`Kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown record kind '{0}' (expected telemetry, command or detection)")]
pub struct ParseKindError(pub String);

impl FromStr for Kind {
    type Err = ParseKindError;

    /// Accepts singular and plural spellings (`command`, `commands`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telemetry" => Ok(Kind::Telemetry),
            "command" | "commands" => Ok(Kind::Command),
            "detection" | "detections" => Ok(Kind::Detection),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}
