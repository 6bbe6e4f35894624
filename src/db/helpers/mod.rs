use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format of `rDatetime`. Always UTC.
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Minute-precision rows written by older loggers.
const STORED_TIMESTAMP_FORMAT_MINUTES: &str = "%Y-%m-%d %H:%M";

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(STORED_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, STORED_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, STORED_TIMESTAMP_FORMAT_MINUTES))
        .map(|naive| naive.and_utc())
        .map_err(|err| anyhow!("failed to parse {field} '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 9, 5, 7).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01 09:05:07");
    }

    #[test]
    fn parses_both_stored_precisions() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            parse_timestamp("2024-01-01 10:00:00", "rDatetime").unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp("2024-01-01 10:00", "rDatetime").unwrap(),
            expected
        );
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("yesterday", "rDatetime").unwrap_err();
        assert!(err.to_string().contains("rDatetime"));
    }
}
