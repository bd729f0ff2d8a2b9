//! Line codec for the durable log.
//!
//! One record per line, comma-separated, fields in the fixed column order of
//! [`Kind::header`]. Fields containing a comma or a quote are wrapped in
//! double quotes with inner quotes doubled. Line breaks inside text fields are
//! flattened to spaces so a record never spans two lines.

use std::borrow::Cow;

use fleetlink_core::record::{CommandRecord, DetectionRecord, Record, TelemetryRecord};
use fleetlink_core::{Kind, StoreError, StoreResult, Timestamp};

/// The header line for `kind`, without trailing newline.
pub fn header_line(kind: Kind) -> String {
    kind.header().join(",")
}

/// Encodes one field.
pub fn encode_field(raw: &str) -> Cow<'_, str> {
    let flattened: Cow<'_, str> = if raw.contains(['\r', '\n']) {
        Cow::Owned(raw.replace("\r\n", " ").replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(raw)
    };

    let needs_quotes = flattened.contains([',', '"'])
        || flattened.starts_with(' ')
        || flattened.ends_with(' ');
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", flattened.replace('"', "\"\"")))
    } else {
        flattened
    }
}

/// Splits one line into its fields, honoring quoting.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut field_was_quoted = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
            continue;
        }
        match c {
            ',' => {
                fields.push(std::mem::take(&mut current));
                field_was_quoted = false;
            }
            '"' if current.is_empty() && !field_was_quoted => {
                in_quotes = true;
                field_was_quoted = true;
            }
            '"' => return Err("unexpected quote inside unquoted field".to_string()),
            _ if field_was_quoted => {
                return Err("characters after closing quote".to_string());
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Encodes a record as one line (no trailing newline).
pub fn encode_record(record: &Record) -> String {
    let fields: Vec<String> = match record {
        Record::Telemetry(r) => vec![
            r.id.to_string(),
            r.entity_id.to_string(),
            r.temperature.to_string(),
            r.vibration.to_string(),
            r.battery_pct.to_string(),
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
            r.confidence.to_string(),
            r.x.to_string(),
            r.y.to_string(),
            r.w.to_string(),
            r.h.to_string(),
            opt(&r.frame_id),
            opt(&r.entity_id),
            opt(&r.region),
            r.timestamp.to_string(),
        ],
    };

    fields
        .iter()
        .map(|f| encode_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Field accessor that reports which column broke.
struct Row<'a> {
    kind: Kind,
    line_no: usize,
    fields: &'a [String],
}

impl<'a> Row<'a> {
    fn text(&self, idx: usize) -> &'a str {
        self.fields[idx].as_str()
    }

    fn optional_text(&self, idx: usize) -> Option<String> {
        let raw = self.text(idx);
        (!raw.is_empty()).then(|| raw.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, idx: usize) -> StoreResult<T> {
        self.text(idx).trim().parse::<T>().map_err(|_| {
            StoreError::corrupt_row(
                self.kind,
                self.line_no,
                format!("invalid {} '{}'", self.kind.header()[idx], self.text(idx)),
            )
        })
    }

    fn parse_optional<T: std::str::FromStr>(&self, idx: usize) -> StoreResult<Option<T>> {
        if self.text(idx).trim().is_empty() {
            Ok(None)
        } else {
            self.parse(idx).map(Some)
        }
    }

    fn timestamp(&self, idx: usize) -> StoreResult<Timestamp> {
        Timestamp::parse(self.text(idx))
            .map_err(|e| StoreError::corrupt_row(self.kind, self.line_no, e.to_string()))
    }
}

/// Decodes one data line of `kind`. `line_no` is 1-based and only used for
/// error reporting.
pub fn decode_row(kind: Kind, line: &str, line_no: usize) -> StoreResult<Record> {
    let fields =
        split_line(line).map_err(|reason| StoreError::corrupt_row(kind, line_no, reason))?;
    let expected = kind.header().len();
    if fields.len() != expected {
        return Err(StoreError::corrupt_row(
            kind,
            line_no,
            format!("expected {} fields, found {}", expected, fields.len()),
        ));
    }

    let row = Row {
        kind,
        line_no,
        fields: &fields,
    };

    let record = match kind {
        Kind::Telemetry => Record::Telemetry(TelemetryRecord {
            id: row.parse(0)?,
            entity_id: row.parse(1)?,
            temperature: row.parse(2)?,
            vibration: row.parse(3)?,
            battery_pct: row.parse(4)?,
            timestamp: row.timestamp(5)?,
        }),
        Kind::Command => Record::Command(CommandRecord {
            id: row.parse(0)?,
            entity_id: row.parse(1)?,
            kind: row.text(2).to_string(),
            reason: row.optional_text(3),
            timestamp: row.timestamp(4)?,
        }),
        Kind::Detection => Record::Detection(DetectionRecord {
            id: row.parse(0)?,
            source: row.text(1).to_string(),
            label: row.text(2).to_string(),
            confidence: row.parse(3)?,
            x: row.parse(4)?,
            y: row.parse(5)?,
            w: row.parse(6)?,
            h: row.parse(7)?,
            frame_id: row.parse_optional(8)?,
            entity_id: row.parse_optional(9)?,
            region: row.optional_text(10),
            timestamp: row.timestamp(11)?,
        }),
    };
    Ok(record)
}

/// Number of lines in `bytes`, counting a trailing unterminated line.
pub fn count_lines(bytes: &[u8]) -> usize {
    let terminated = bytes.iter().filter(|&&b| b == b'\n').count();
    match bytes.last() {
        Some(b'\n') | None => terminated,
        Some(_) => terminated + 1,
    }
}
