//! Second-precision local timestamps.
//!
//! Records carry their creation time as `YYYY-MM-DD HH:MM:SS` in local time.
//! That representation sorts lexicographically in chronological order, which
//! the durable log relies on when it reads its tail.

use core::fmt;
use core::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

/// Canonical storage format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted when reading timestamps produced elsewhere (simulators
/// write ISO-8601 with a `T` separator, some producers add fractions).
const ACCEPTED_FORMATS: [&str; 4] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A local wall-clock instant truncated to whole seconds.
///
/// Ordering is chronological and agrees with the lexicographic ordering of
/// the [`Display`](fmt::Display) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current local time, truncated to the second.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(dt: NaiveDateTime) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Parses any of the accepted timestamp layouts.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let trimmed = s.trim();
        ACCEPTED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(Self::from_naive)
            .ok_or_else(|| StoreError::Timestamp {
                input: s.to_string(),
            })
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self::from_naive(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_storage_format() {
        let ts = Timestamp::parse("2024-05-01 08:30:15").unwrap();
        assert_eq!(ts.to_string(), "2024-05-01 08:30:15");
    }

    #[test]
    fn test_parse_accepts_iso_and_fractions() {
        let iso = Timestamp::parse("2024-05-01T08:30:15").unwrap();
        let frac = Timestamp::parse("2024-05-01 08:30:15.734").unwrap();
        assert_eq!(iso, frac);
        assert_eq!(frac.to_string(), "2024-05-01 08:30:15");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse("yesterday"),
            Err(StoreError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_order_agrees_with_string_order() {
        let a = Timestamp::parse("2024-05-01 09:59:59").unwrap();
        let b = Timestamp::parse("2024-05-01 10:00:00").unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_naive().nanosecond(), 0);
    }
}
