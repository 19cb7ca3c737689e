//! Timestamp coercion for transaction date fields
//!
//! The remote API is not consistent about how it serializes dates, so every
//! date field goes through [`coerce_timestamp`]. A value that cannot be read
//! as an instant becomes `None`; it never fails the record.
//!
//! Accepted shapes:
//!
//! - RFC 3339 instants (`2024-03-01T10:00:00Z`, `2024-03-01T10:00:00.000-03:00`)
//! - naive date-times (`2024-03-01 10:00:00`, `2024-03-01T10:00:00.250`), read as UTC
//! - bare dates (`2024-03-01`), read as midnight UTC
//! - integer epoch milliseconds (`1709287200000`)

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Naive date-time layouts tried after RFC 3339, in order.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Layout used for bare calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Coerce a raw JSON value into a UTC timestamp.
///
/// Strings are parsed with [`parse_timestamp`]; integers are epoch
/// milliseconds. Anything else, including `null`, yields `None`.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Parse a timestamp string in any of the accepted layouts.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
