// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// input formats, most specific first
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f", // 1991-01-08 04:05:06.789
    "%Y-%m-%d %H:%M:%S",    // 1991-01-08 04:05:06
    "%Y-%m-%dT%H:%M:%S",    // 1991-01-08T04:05:06
];

/// Microseconds since `1970-01-01 00:00:00` UTC.
#[derive(
    PartialOrd, Ord, PartialEq, Eq, Debug, Copy, Clone, Default, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTimestampError {
    #[error("invalid string: {0}")]
    InvalidString(String),
}

impl Timestamp {
    pub const fn from_micros(value: i64) -> Self {
        Self(value)
    }

    pub const fn micros(&self) -> i64 {
        self.0
    }

    pub fn checked_add_micros(self, delta: i64) -> Option<Self> {
        self.0.checked_add(delta).map(Self)
    }
}

impl Display for Timestamp {
    /// ISO 8601 format: `YYYY-MM-DD HH:MM:SS[.ffffff]`
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let dt = DateTime::from_timestamp_micros(self.0).ok_or(std::fmt::Error)?;
        write!(f, "{}", dt.naive_utc())
    }
}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for fmt in TIMESTAMP_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self(dt.and_utc().timestamp_micros()));
            }
        }
        // a bare date means midnight
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(dt.and_utc().timestamp_micros()));
            }
        }
        Err(ParseTimestampError::InvalidString(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("1970-01-01 00:00:00", 0)]
    #[test_case("1970-01-01 00:00:01", 1_000_000)]
    #[test_case("1970-01-01 00:00:00.5", 500_000)]
    #[test_case("1970-01-02", 86_400_000_000)]
    fn parse(s: &str, micros: i64) {
        assert_eq!(s.parse::<Timestamp>().unwrap().micros(), micros);
    }

    #[test]
    fn display() {
        let ts = Timestamp::from_micros(1_000_000);
        assert_eq!(ts.to_string(), "1970-01-01 00:00:01");
    }

    #[test]
    fn invalid() {
        assert!("yesterday".parse::<Timestamp>().is_err());
    }
}
