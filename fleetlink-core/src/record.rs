//! Record model.
//!
//! `New*` types are what producers hand to the façade; the stored records add
//! the backend-assigned `id` and the creation timestamp. Serialized field
//! names follow the storage columns (`id_moto`, `temp_c`, `vib`, `batt_pct`,
//! `ts`) so JSON output lines up with the durable log and the device wire
//! format.

use serde::{Deserialize, Serialize};

use crate::kind::Kind;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Payloads (pre-storage)
// ---------------------------------------------------------------------------

/// A telemetry reading as reported by a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTelemetry {
    #[serde(rename = "id_moto")]
    pub entity_id: u64,
    /// Degrees Celsius
    #[serde(rename = "temp_c")]
    pub temperature: f64,
    #[serde(rename = "vib")]
    pub vibration: f64,
    /// Battery charge, 0..=100
    #[serde(rename = "batt_pct")]
    pub battery_pct: f64,
}

impl NewTelemetry {
    pub fn new(entity_id: u64, temperature: f64, vibration: f64, battery_pct: f64) -> Self {
        Self {
            entity_id,
            temperature,
            vibration,
            battery_pct,
        }
    }
}

/// An actuator command addressed to a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommand {
    #[serde(rename = "id_moto")]
    pub entity_id: u64,
    /// Open set: `lock`, `unlock`, `horn`, `led_on`, `led_off`, ...
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NewCommand {
    pub fn new(entity_id: u64, kind: impl Into<String>) -> Self {
        Self {
            entity_id,
            kind: kind.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A vision detection, optionally correlated with a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetection {
    /// Origin tag of the detector (camera name, model, ...)
    pub source: String,
    pub label: String,
    #[serde(rename = "conf")]
    pub confidence: f64,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    #[serde(default)]
    pub frame_id: Option<i64>,
    #[serde(rename = "id_moto", default)]
    pub entity_id: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
}

impl NewDetection {
    pub fn new(
        source: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
        (x, y, w, h): (i64, i64, i64, i64),
    ) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            confidence,
            x,
            y,
            w,
            h,
            frame_id: None,
            entity_id: None,
            region: None,
        }
    }

    pub fn with_frame(mut self, frame_id: i64) -> Self {
        self.frame_id = Some(frame_id);
        self
    }

    pub fn with_entity(mut self, entity_id: u64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Anything that can be handed to [`Persistence::save`](crate::Persistence::save).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Telemetry(NewTelemetry),
    Command(NewCommand),
    Detection(NewDetection),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Telemetry(_) => Kind::Telemetry,
            Payload::Command(_) => Kind::Command,
            Payload::Detection(_) => Kind::Detection,
        }
    }

    pub fn entity_id(&self) -> Option<u64> {
        match self {
            Payload::Telemetry(t) => Some(t.entity_id),
            Payload::Command(c) => Some(c.entity_id),
            Payload::Detection(d) => d.entity_id,
        }
    }

    /// Builds the stored record once a backend has assigned `id`.
    pub fn to_record(&self, id: u64, timestamp: Timestamp) -> Record {
        match self {
            Payload::Telemetry(t) => Record::Telemetry(TelemetryRecord {
                id,
                entity_id: t.entity_id,
                temperature: t.temperature,
                vibration: t.vibration,
                battery_pct: t.battery_pct,
                timestamp,
            }),
            Payload::Command(c) => Record::Command(CommandRecord {
                id,
                entity_id: c.entity_id,
                kind: c.kind.clone(),
                reason: c.reason.clone(),
                timestamp,
            }),
            Payload::Detection(d) => Record::Detection(DetectionRecord {
                id,
                source: d.source.clone(),
                label: d.label.clone(),
                confidence: d.confidence,
                x: d.x,
                y: d.y,
                w: d.w,
                h: d.h,
                frame_id: d.frame_id,
                entity_id: d.entity_id,
                region: d.region.clone(),
                timestamp,
            }),
        }
    }
}

impl From<NewTelemetry> for Payload {
    fn from(t: NewTelemetry) -> Self {
        Payload::Telemetry(t)
    }
}

impl From<NewCommand> for Payload {
    fn from(c: NewCommand) -> Self {
        Payload::Command(c)
    }
}

impl From<NewDetection> for Payload {
    fn from(d: NewDetection) -> Self {
        Payload::Detection(d)
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: u64,
    #[serde(rename = "id_moto")]
    pub entity_id: u64,
    #[serde(rename = "temp_c")]
    pub temperature: f64,
    #[serde(rename = "vib")]
    pub vibration: f64,
    #[serde(rename = "batt_pct")]
    pub battery_pct: f64,
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: u64,
    #[serde(rename = "id_moto")]
    pub entity_id: u64,
    pub kind: String,
    pub reason: Option<String>,
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: u64,
    pub source: String,
    pub label: String,
    #[serde(rename = "conf")]
    pub confidence: f64,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub frame_id: Option<i64>,
    #[serde(rename = "id_moto")]
    pub entity_id: Option<u64>,
    pub region: Option<String>,
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
}

/// A stored record of any kind.
///
/// Serialized untagged: each variant already carries distinct columns and
/// consumers dispatch on the `kind` they asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Telemetry(TelemetryRecord),
    Command(CommandRecord),
    Detection(DetectionRecord),
}

impl Record {
    pub fn kind(&self) -> Kind {
        match self {
            Record::Telemetry(_) => Kind::Telemetry,
            Record::Command(_) => Kind::Command,
            Record::Detection(_) => Kind::Detection,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Record::Telemetry(r) => r.id,
            Record::Command(r) => r.id,
            Record::Detection(r) => r.id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Record::Telemetry(r) => r.timestamp,
            Record::Command(r) => r.timestamp,
            Record::Detection(r) => r.timestamp,
        }
    }

    pub fn entity_id(&self) -> Option<u64> {
        match self {
            Record::Telemetry(r) => Some(r.entity_id),
            Record::Command(r) => Some(r.entity_id),
            Record::Detection(r) => r.entity_id,
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetryRecord> {
        match self {
            Record::Telemetry(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_telemetry_serializes_with_storage_names() {
        let record = Payload::from(NewTelemetry::new(7, 41.5, 0.4, 88.0))
            .to_record(3, ts("2024-05-01 08:00:00"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["id_moto"], 7);
        assert_eq!(json["temp_c"], 41.5);
        assert_eq!(json["vib"], 0.4);
        assert_eq!(json["batt_pct"], 88.0);
        assert_eq!(json["ts"], "2024-05-01 08:00:00");
    }

    #[test]
    fn test_payload_kind_and_entity() {
        let cmd = Payload::from(NewCommand::new(4, "lock").with_reason("parked"));
        assert_eq!(cmd.kind(), Kind::Command);
        assert_eq!(cmd.entity_id(), Some(4));

        let det = Payload::from(NewDetection::new("cam-1", "moto", 0.93, (1, 2, 30, 40)));
        assert_eq!(det.kind(), Kind::Detection);
        assert_eq!(det.entity_id(), None);
    }

    #[test]
    fn test_to_record_carries_optional_fields() {
        let payload = Payload::from(
            NewDetection::new("cam-2", "moto", 0.5, (0, 0, 10, 10))
                .with_frame(12)
                .with_entity(9)
                .with_region("Nordeste"),
        );
        let record = payload.to_record(1, ts("2024-05-01 08:00:00"));
        match record {
            Record::Detection(d) => {
                assert_eq!(d.frame_id, Some(12));
                assert_eq!(d.entity_id, Some(9));
                assert_eq!(d.region.as_deref(), Some("Nordeste"));
            }
            other => panic!("expected detection, got {other:?}"),
        }
    }
}
