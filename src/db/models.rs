use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Calibration data for one `(station, parameter json name)` binding.
///
/// `calibrated = raw * scale_factor + offset`
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct Calibration {
    pub sensor_id: i32,
    pub scale_factor: f64,
    pub offset: f64,
}

/// An alert rule joined with the json name of the parameter it watches.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AlertRule {
    pub id: i32,
    pub parameter_json_name: String,
    /// Raw comparison operator as stored; see `alerts::Condition`.
    pub condition: String,
    pub name: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub sensor_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub calibrated_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOccurrence {
    pub alert_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub value: f64,
}
