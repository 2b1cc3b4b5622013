use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Reserved payload key carrying the station's MAC address.
pub const STATION_FIELD: &str = "uid";
/// Reserved payload key carrying the raw epoch, in seconds.
pub const EPOCH_FIELD: &str = "uxt";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("missing required field {0:?}")]
    MissingField(&'static str),
    #[error("field {0:?} must be a string or a number")]
    InvalidField(&'static str),
}

/// A raw station payload as buffered by the ingestion endpoint.
///
/// Wire shape: `{"uid": "AA:BB:CC", "uxt": "1700000000", "temp": "23.5", ...}`.
/// `uid` and `uxt` are pulled out; every other key is a measurement keyed by
/// parameter json name.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedReading {
    pub station_id: String,
    pub epoch_seconds: String,
    pub fields: BTreeMap<String, String>,
}

impl StagedReading {
    pub fn parse(bytes: &[u8]) -> Result<Self, PayloadError> {
        let Value::Object(mut object) = serde_json::from_slice::<Value>(bytes)? else {
            return Err(PayloadError::NotAnObject);
        };

        let station_id = take_scalar(&mut object, STATION_FIELD)?;
        let epoch_seconds = take_scalar(&mut object, EPOCH_FIELD)?;

        // Non-scalar values are kept as JSON text and rejected later, per field.
        let fields = object
            .into_iter()
            .map(|(name, value)| {
                let raw = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, raw)
            })
            .collect();

        Ok(Self { station_id, epoch_seconds, fields })
    }
}

fn take_scalar(
    object: &mut serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<String, PayloadError> {
    match object.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(PayloadError::InvalidField(key)),
        None => Err(PayloadError::MissingField(key)),
    }
}

/// Parse a raw field value as sent by a station (`"23.5"`, `"61"`, ` 7 `).
pub fn parse_raw_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}
