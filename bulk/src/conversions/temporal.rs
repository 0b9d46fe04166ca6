use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIMESTAMPTZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

pub fn parse_date(s: &str) -> BulkResult<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?)
}

pub fn parse_time(s: &str) -> BulkResult<NaiveTime> {
    Ok(NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)?)
}

/// Parses a timestamp without time zone, accepting a space or `T` separator and a bare date.
pub fn parse_timestamp(s: &str) -> BulkResult<NaiveDateTime> {
    let s = s.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(timestamp);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(bulk_error!(
        ErrorKind::ConversionError,
        "Datetime parsing failed",
        format!("'{s}' is not a valid timestamp")
    ))
}

/// Parses a timestamp with time zone and normalizes it to UTC.
///
/// RFC 3339 and the Postgres output format (`+00`, `+05:30`) are accepted. A value without
/// offset is taken to be in UTC, which is the session time zone of engine connections.
pub fn parse_timestamptz(s: &str) -> BulkResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    for format in TIMESTAMPTZ_FORMATS {
        if let Ok(timestamp) = DateTime::<FixedOffset>::parse_from_str(s, format) {
            return Ok(timestamp.with_timezone(&Utc));
        }
    }

    parse_timestamp(s).map(|timestamp| timestamp.and_utc())
}
