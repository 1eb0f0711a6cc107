use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::ffi;

/// Storage format for `screenshots.timestamp` (naive local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str, field: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// True for a UNIQUE constraint violation (as opposed to NOT NULL, CHECK, ...).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_round_trips_through_storage_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let stored = format_timestamp(&ts);
        assert_eq!(stored, "2024-01-01T10:00:00");
        assert_eq!(parse_timestamp(&stored, "timestamp").unwrap(), ts);
    }

    #[test]
    fn rejects_negative_counts() {
        assert!(to_u64(-1, "count").is_err());
        assert_eq!(to_u64(3, "count").unwrap(), 3);
    }
}
