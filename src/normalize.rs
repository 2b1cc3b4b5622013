//! Raw reading → calibrated measurement.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Stations report local epoch seconds that are stored shifted to UTC-3.
/// Regional constant; not configurable.
const REGIONAL_OFFSET_HOURS: i64 = -3;

#[derive(Debug, Error, PartialEq)]
pub enum TimestampError {
    #[error("epoch {0:?} is not a number")]
    NotNumeric(String),
    #[error("epoch {0:?} is outside the representable range")]
    OutOfRange(String),
}

/// `raw * scale_factor + offset`.
///
/// Not guarded: non-finite inputs propagate into the result.
#[inline]
pub fn normalize(raw: f64, scale_factor: f64, offset: f64) -> f64 {
    raw * scale_factor + offset
}

/// Floors `epoch_seconds` to whole seconds since the Unix epoch and applies
/// the fixed UTC-3 shift.
pub fn correct_timestamp(epoch_seconds: &str) -> Result<DateTime<Utc>, TimestampError> {
    let parsed = epoch_seconds
        .trim()
        .parse::<f64>()
        .map_err(|_| TimestampError::NotNumeric(epoch_seconds.to_owned()))?;

    let out_of_range = || TimestampError::OutOfRange(epoch_seconds.to_owned());
    if !parsed.is_finite() {
        return Err(out_of_range());
    }

    let instant = DateTime::from_timestamp(parsed.floor() as i64, 0).ok_or_else(out_of_range)?;
    instant
        .checked_add_signed(Duration::hours(REGIONAL_OFFSET_HOURS))
        .ok_or_else(out_of_range)
}

/// ISO-8601 instant with millisecond precision, e.g. `2023-11-14T19:13:20.000Z`.
pub fn to_iso8601(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
