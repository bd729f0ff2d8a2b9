//! Table Output Formatting

use std::collections::BTreeMap;

use colored::Colorize;
use fleetlink_core::{Kind, Reading, Record, VehicleStatus};
use fleetlink_mqtt_connector::StatsSnapshot;
use tabled::{builder::Builder, settings::Style};

fn opt<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

fn record_cells(record: &Record) -> Vec<String> {
    match record {
        Record::Telemetry(r) => vec![
            r.id.to_string(),
            r.entity_id.to_string(),
            format!("{:.1}", r.temperature),
            format!("{:.2}", r.vibration),
            format!("{:.0}", r.battery_pct),
            r.timestamp.to_string(),
        ],
        Record::Command(r) => vec![
            r.id.to_string(),
            r.entity_id.to_string(),
            r.kind.clone(),
            opt(&r.reason),
            r.timestamp.to_string(),
        ],
        Record::Detection(r) => vec![
            r.id.to_string(),
            r.source.clone(),
            r.label.clone(),
            format!("{:.2}", r.confidence),
            r.x.to_string(),
            r.y.to_string(),
            r.w.to_string(),
            r.h.to_string(),
            opt(&r.frame_id),
            opt(&r.entity_id),
            opt(&r.region),
            r.timestamp.to_string(),
        ],
    }
}

/// Format stored records of one kind, columns as in storage
pub fn format_records_table(kind: Kind, records: &[Record]) -> String {
    if records.is_empty() {
        return format!("No {} records found", kind);
    }

    let mut builder = Builder::default();
    builder.push_record(kind.header().iter().copied());
    for record in records {
        builder.push_record(record_cells(record));
    }

    builder.build().with(Style::modern()).to_string()
}

fn status_cell(status: VehicleStatus) -> String {
    match status {
        VehicleStatus::Maintenance => status.as_str().red().bold().to_string(),
        VehicleStatus::InUse => status.as_str().green().to_string(),
        VehicleStatus::Idle => status.as_str().dimmed().to_string(),
    }
}

/// Format the latest reading per vehicle
pub fn format_live_table(live: &BTreeMap<u64, Reading>) -> String {
    if live.is_empty() {
        return "No telemetry yet".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(vec![
        "Vehicle", "Status", "Temp °C", "Vibration", "Battery %", "Zone", "Last seen",
    ]);

    for reading in live.values() {
        builder.push_record(vec![
            reading.entity_id.to_string(),
            status_cell(reading.status()),
            format!("{:.1}", reading.temperature),
            format!("{:.2}", reading.vibration),
            format!("{:.0}", reading.battery_pct),
            opt(&reading.zone),
            reading.timestamp.to_string(),
        ]);
    }

    builder.build().with(Style::modern()).to_string()
}

/// Format ingestion counters
pub fn format_stats_table(stats: &StatsSnapshot) -> String {
    let mut builder = Builder::default();
    builder.push_record(vec!["Received", "Primary", "Fallback", "Dropped"]);
    builder.push_record(vec![
        stats.received.to_string(),
        stats.primary.to_string(),
        stats.fallback.to_string(),
        stats.dropped.to_string(),
    ]);
    builder.build().with(Style::modern()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{NewCommand, Payload, Timestamp};

    #[test]
    fn test_empty_tables() {
        assert_eq!(format_records_table(Kind::Command, &[]), "No command records found");
        assert_eq!(format_live_table(&BTreeMap::new()), "No telemetry yet");
    }

    #[test]
    fn test_records_table_uses_storage_columns() {
        colored::control::set_override(false);
        let at = Timestamp::parse("2024-05-01 10:00:00").unwrap();
        let record = Payload::from(NewCommand::new(7, "lock")).to_record(3, at);

        let table = format_records_table(Kind::Command, &[record]);
        assert!(table.contains("reason"));
        assert!(table.contains("lock"));
        assert!(table.contains("2024-05-01 10:00:00"));
    }

    #[test]
    fn test_live_table_shows_status() {
        colored::control::set_override(false);
        let mut live = BTreeMap::new();
        live.insert(
            8,
            Reading {
                entity_id: 8,
                temperature: 30.0,
                vibration: 1.5,
                battery_pct: 70.0,
                timestamp: Timestamp::parse("2024-05-01 10:00:00").unwrap(),
                zone: Some("A2".to_string()),
            },
        );

        let table = format_live_table(&live);
        assert!(table.contains("in_use"));
        assert!(table.contains("A2"));
    }
}
