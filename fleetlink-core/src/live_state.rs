//! Live-state aggregation: one current reading per vehicle.
//!
//! Recent telemetry may come from either backend, from simulator files or
//! from raw device JSON, and the same vehicle usually appears many times.
//! Rows are first normalized into a canonical [`Reading`] through a closed set
//! of known [`ReadingSchema`]s, then folded so that each vehicle keeps its
//! newest reading.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{Record, TelemetryRecord};
use crate::time::Timestamp;
use crate::value::{lenient_f64, lenient_string, lenient_u64};

/// Battery percentage strictly below this puts a vehicle in maintenance.
pub const MAINTENANCE_BATTERY_PCT: f64 = 30.0;
/// Temperature (°C) strictly above this puts a vehicle in maintenance.
pub const MAINTENANCE_TEMPERATURE_C: f64 = 60.0;
/// Vibration strictly above this means the vehicle is being ridden.
pub const IN_USE_VIBRATION: f64 = 1.0;

/// Operational status derived from a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Maintenance,
    InUse,
    Idle,
}

impl VehicleStatus {
    /// Maintenance wins over in-use; thresholds are strict.
    pub fn classify(reading: &Reading) -> Self {
        if reading.battery_pct < MAINTENANCE_BATTERY_PCT
            || reading.temperature > MAINTENANCE_TEMPERATURE_C
        {
            VehicleStatus::Maintenance
        } else if reading.vibration > IN_USE_VIBRATION {
            VehicleStatus::InUse
        } else {
            VehicleStatus::Idle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::InUse => "in_use",
            VehicleStatus::Idle => "idle",
        }
    }
}

/// Canonical telemetry reading used by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub entity_id: u64,
    pub temperature: f64,
    pub vibration: f64,
    pub battery_pct: f64,
    pub timestamp: Timestamp,
    /// Yard zone, only reported by simulator feeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl Reading {
    pub fn status(&self) -> VehicleStatus {
        VehicleStatus::classify(self)
    }
}

impl From<&TelemetryRecord> for Reading {
    fn from(r: &TelemetryRecord) -> Self {
        Self {
            entity_id: r.entity_id,
            temperature: r.temperature,
            vibration: r.vibration,
            battery_pct: r.battery_pct,
            timestamp: r.timestamp,
            zone: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Field names of one producer's row layout.
struct SchemaKeys {
    entity_id: &'static str,
    temperature: &'static str,
    vibration: &'static str,
    battery_pct: &'static str,
    timestamp: &'static str,
    zone: Option<&'static str>,
}

/// The row layouts FleetLink knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingSchema {
    /// Durable log / primary store rows: `id_moto,temp_c,vib,batt_pct,ts`.
    Stored,
    /// Simulator feed: `id_moto,temp_c,vib,batt_pct,zona,timestamp`.
    Simulator,
    /// Canonical JSON: `entity_id,temperature,vibration,battery_pct,timestamp`.
    Canonical,
}

impl ReadingSchema {
    /// Picks the schema from the keys present in `row`.
    pub fn detect(row: &Map<String, Value>) -> Option<Self> {
        if row.contains_key("entity_id") {
            Some(ReadingSchema::Canonical)
        } else if row.contains_key("id_moto") && row.contains_key("ts") {
            Some(ReadingSchema::Stored)
        } else if row.contains_key("id_moto") && row.contains_key("timestamp") {
            Some(ReadingSchema::Simulator)
        } else {
            None
        }
    }

    fn keys(self) -> SchemaKeys {
        match self {
            ReadingSchema::Stored => SchemaKeys {
                entity_id: "id_moto",
                temperature: "temp_c",
                vibration: "vib",
                battery_pct: "batt_pct",
                timestamp: "ts",
                zone: None,
            },
            ReadingSchema::Simulator => SchemaKeys {
                entity_id: "id_moto",
                temperature: "temp_c",
                vibration: "vib",
                battery_pct: "batt_pct",
                timestamp: "timestamp",
                zone: Some("zona"),
            },
            ReadingSchema::Canonical => SchemaKeys {
                entity_id: "entity_id",
                temperature: "temperature",
                vibration: "vibration",
                battery_pct: "battery_pct",
                timestamp: "timestamp",
                zone: Some("zone"),
            },
        }
    }
}

/// Why a row could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("row matches no known telemetry layout")]
    UnknownSchema,

    #[error("field '{0}' is missing or not a valid value")]
    Field(&'static str),
}

/// Maps one row of any known layout into a [`Reading`].
pub fn normalize(row: &Map<String, Value>) -> Result<Reading, NormalizeError> {
    let schema = ReadingSchema::detect(row).ok_or(NormalizeError::UnknownSchema)?;
    let keys = schema.keys();

    let number = |key: &'static str| {
        row.get(key)
            .and_then(lenient_f64)
            .ok_or(NormalizeError::Field(key))
    };

    let entity_id = row
        .get(keys.entity_id)
        .and_then(lenient_u64)
        .ok_or(NormalizeError::Field(keys.entity_id))?;
    let timestamp = row
        .get(keys.timestamp)
        .and_then(Value::as_str)
        .and_then(|s| Timestamp::parse(s).ok())
        .ok_or(NormalizeError::Field(keys.timestamp))?;

    Ok(Reading {
        entity_id,
        temperature: number(keys.temperature)?,
        vibration: number(keys.vibration)?,
        battery_pct: number(keys.battery_pct)?,
        timestamp,
        zone: keys.zone.and_then(|k| row.get(k)).and_then(lenient_string),
    })
}

/// Normalizes every row that can be normalized and reports the rest.
pub fn normalize_rows<'a, I>(rows: I) -> Vec<Reading>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    rows.into_iter()
        .filter_map(|row| match normalize(row) {
            Ok(reading) => Some(reading),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Skipping telemetry row: {}", _e);
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Keeps the newest reading per entity.
///
/// Input order carries no meaning. On equal timestamps the reading processed
/// last wins.
pub fn latest_by_entity<I>(readings: I) -> BTreeMap<u64, Reading>
where
    I: IntoIterator<Item = Reading>,
{
    let mut latest: BTreeMap<u64, Reading> = BTreeMap::new();
    for reading in readings {
        match latest.get(&reading.entity_id) {
            Some(current) if current.timestamp > reading.timestamp => {}
            _ => {
                latest.insert(reading.entity_id, reading);
            }
        }
    }
    latest
}

/// [`latest_by_entity`] over stored records; non-telemetry records are ignored.
pub fn latest_from_records(records: &[Record]) -> BTreeMap<u64, Reading> {
    latest_by_entity(
        records
            .iter()
            .filter_map(Record::as_telemetry)
            .map(Reading::from),
    )
}
