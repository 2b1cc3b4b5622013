use tracing::warn;

use crate::db::{models::Calibration, StoreError, TelemetryStore};

/// Resolves the sensor and calibration coefficients a station field maps to.
///
/// `Ok(None)` is the normal outcome for fields without a provisioned sensor.
/// When several sensors on the same station share a parameter json name, the
/// lowest sensor id wins.
pub async fn resolve<T: TelemetryStore>(
    store: &T,
    station_mac: &str,
    parameter_json_name: &str,
) -> Result<Option<Calibration>, StoreError> {
    let matches = store.calibrations(station_mac, parameter_json_name).await?;

    if matches.len() > 1 {
        warn!(
            station = %station_mac,
            parameter = %parameter_json_name,
            bindings = matches.len(),
            sensor_id = matches[0].sensor_id,
            "Ambiguous sensor binding; using the lowest sensor id"
        );
    }

    Ok(matches.into_iter().next())
}
