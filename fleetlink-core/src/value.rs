//! Lenient scalar extraction from JSON values.
//!
//! Devices, simulators and the durable log disagree on whether numbers are
//! JSON numbers or strings (`"temp_c": 41.2` vs `"temp_c": "41.2"`). These
//! helpers accept both and reject everything else.

use serde_json::Value;

/// Reads a finite float from a number or a numeric string.
pub fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Reads an integer from an integer, an integral float or an integer string.
/// Values outside the `i64` range are rejected, never clamped.
pub fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| integral_within(*f, i64::MIN as f64, i64::MAX as f64))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a non-negative integer, up to `u64::MAX`.
pub fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| integral_within(*f, 0.0, u64::MAX as f64))
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

// `max` is a power of two one past the largest integer, hence the open bound.
fn integral_within(f: f64, min: f64, max: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= min && f < max
}

/// Reads text; numbers are rendered, `null` and empty strings are absent.
pub fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
