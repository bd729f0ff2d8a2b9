//! JSON Output Formatting

use std::collections::BTreeMap;

use fleetlink_core::Reading;
use serde::Serialize;
use serde_json::Value;

/// Format data as pretty or compact JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    }
}

/// Live view as a JSON array, each reading with its derived status
pub fn format_live_json(
    live: &BTreeMap<u64, Reading>,
    pretty: bool,
) -> Result<String, serde_json::Error> {
    let rows = live
        .values()
        .map(|reading| {
            let mut row = serde_json::to_value(reading)?;
            if let Value::Object(map) = &mut row {
                map.insert("status".to_string(), serde_json::to_value(reading.status())?);
            }
            Ok(row)
        })
        .collect::<Result<Vec<Value>, serde_json::Error>>()?;
    format_json(&rows, pretty)
}
