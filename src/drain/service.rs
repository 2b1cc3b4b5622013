use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::{sync::Mutex, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::DrainSummary;
use crate::{
    alerts, calibration,
    db::{
        models::{AlertRule, NewMeasurement, NewOccurrence},
        StoreError, TelemetryStore,
    },
    dead_letter::DeadLetterLog,
    normalize::{self, correct_timestamp, to_iso8601},
    staging::{parse_raw_value, StagedReading, StagingStore},
};

#[derive(Debug, Error)]
enum FieldError {
    #[error("sensor lookup failed: {0}")]
    Lookup(#[source] StoreError),
    #[error("value {0:?} is not a number")]
    InvalidValue(String),
    #[error("failed to persist measurement: {0}")]
    Measurement(#[source] StoreError),
}

enum FieldOutcome {
    Recorded,
    Unbound,
}

/// Periodically moves staged station payloads into calibrated measurements
/// and alert occurrences.
///
/// Redelivering a staged key (e.g. after a crash between insert and delete)
/// inserts its measurements and occurrences again; draining is at-most-once
/// per key only while the process stays up.
pub struct DrainService<S, T> {
    staging: S,
    store: T,
    dead_letter: DeadLetterLog,
    interval: Duration,
    /// Held for the whole of `drain_once`; overlapping callers queue behind it.
    run_lock: Mutex<()>,
}

impl<S: StagingStore, T: TelemetryStore> DrainService<S, T> {
    pub fn new(staging: S, store: T, dead_letter: DeadLetterLog, interval: Duration) -> Self {
        Self {
            staging,
            store,
            dead_letter,
            interval,
            run_lock: Mutex::new(()),
        }
    }

    /// Runs the drain loop until `cancel` fires.
    ///
    /// Fixed delay: the next run starts `interval` after the previous one
    /// finished, so runs never overlap.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Drain loop started");

        loop {
            match self.drain_once(&cancel).await {
                Ok(summary) => summary.log(),
                Err(e) => error!(error = %e, "Drain run aborted; staged data left for the next run"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(self.interval) => {}
            }
        }

        info!("Drain loop stopped");
    }

    /// One pass over every key staged at call time.
    ///
    /// Fails only when the key snapshot cannot be taken; everything after that
    /// is isolated per key and per field and reported in the summary.
    /// Cancellation is checked between keys, so a key that has started is
    /// always carried through to its delete.
    ///
    /// Runs on the same service are serialized: a second call waits for the
    /// first to finish and then snapshots whatever is still staged.
    pub async fn drain_once(&self, cancel: &CancellationToken) -> Result<DrainSummary, StoreError> {
        let _guard = self.run_lock.lock().await;

        let keys = self.staging.list_keys().await?;
        let mut summary = DrainSummary { keys_listed: keys.len(), ..Default::default() };

        if keys.is_empty() {
            debug!("No staged readings");
            return Ok(summary);
        }

        for (i, key) in keys.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = keys.len() - i, "Drain cancelled");
                summary.cancelled = true;
                break;
            }
            self.drain_key(key, &mut summary).await;
        }

        Ok(summary)
    }

    async fn drain_key(&self, key: &str, summary: &mut DrainSummary) {
        let bytes = match self.staging.get(key).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                debug!(key = %key, "Staged key vanished before it was read");
                summary.keys_missing += 1;
                None
            }
            Err(e) => {
                // Nothing was processed; leave the key for the next run.
                error!(key = %key, error = %e, "Failed to read staged payload");
                summary.keys_failed += 1;
                return;
            }
        };

        if let Some(bytes) = bytes {
            match parse_staged(&bytes) {
                Ok((reading, recorded_at)) => {
                    self.process_reading(&reading, recorded_at, summary).await;
                }
                Err(reason) => {
                    summary.keys_malformed += 1;
                    self.dead_letter.record(key, &reason, &bytes).await;
                }
            }
        }

        match self.staging.delete(key).await {
            Ok(()) => summary.keys_deleted += 1,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to delete staged key");
                summary.keys_failed += 1;
            }
        }
    }

    async fn process_reading(
        &self,
        reading: &StagedReading,
        recorded_at: DateTime<Utc>,
        summary: &mut DrainSummary,
    ) {
        let station = reading.station_id.as_str();

        let rules = match self.store.alert_rules(station).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(station = %station, error = %e, "Failed to load alert rules; recording measurements only");
                summary.rule_lookups_failed += 1;
                Vec::new()
            }
        };

        for (name, raw) in &reading.fields {
            match self
                .process_field(station, recorded_at, name, raw, &rules, summary)
                .await
            {
                Ok(FieldOutcome::Recorded) => summary.fields_resolved += 1,
                Ok(FieldOutcome::Unbound) => {
                    debug!(station = %station, field = %name, "No sensor bound to field; skipping");
                    summary.fields_skipped += 1;
                }
                Err(e) => {
                    warn!(station = %station, field = %name, error = %e, "Dropping field");
                    summary.fields_failed += 1;
                }
            }
        }
    }

    async fn process_field(
        &self,
        station: &str,
        recorded_at: DateTime<Utc>,
        name: &str,
        raw: &str,
        rules: &[AlertRule],
        summary: &mut DrainSummary,
    ) -> Result<FieldOutcome, FieldError> {
        let Some(calibration) = calibration::resolve(&self.store, station, name)
            .await
            .map_err(FieldError::Lookup)?
        else {
            return Ok(FieldOutcome::Unbound);
        };

        let raw_value = parse_raw_value(raw).ok_or_else(|| FieldError::InvalidValue(raw.to_owned()))?;
        let value = normalize::normalize(raw_value, calibration.scale_factor, calibration.offset);

        let measurement = NewMeasurement {
            sensor_id: calibration.sensor_id,
            recorded_at,
            calibrated_value: value,
        };
        self.store
            .insert_measurement(&measurement)
            .await
            .map_err(FieldError::Measurement)?;

        debug!(
            station = %station,
            field = %name,
            sensor_id = calibration.sensor_id,
            raw = raw_value,
            value,
            recorded_at = %to_iso8601(&recorded_at),
            "Measurement recorded"
        );

        for rule in alerts::triggered(rules, name, value) {
            let occurrence = NewOccurrence { alert_id: rule.id, recorded_at, value };
            match self.store.insert_occurrence(&occurrence).await {
                Ok(_) => {
                    info!(
                        station = %station,
                        alert_id = rule.id,
                        alert = %rule.name,
                        condition = %rule.condition,
                        threshold = rule.threshold,
                        value,
                        "Alert triggered"
                    );
                    summary.occurrences += 1;
                }
                Err(e) => {
                    warn!(station = %station, alert_id = rule.id, error = %e, "Failed to record alert occurrence");
                    summary.occurrences_failed += 1;
                }
            }
        }

        Ok(FieldOutcome::Recorded)
    }
}

/// Parses a staged payload and its corrected timestamp. The error string is
/// what ends up in the dead-letter log.
fn parse_staged(bytes: &[u8]) -> Result<(StagedReading, DateTime<Utc>), String> {
    let reading = StagedReading::parse(bytes).map_err(|e| e.to_string())?;
    let recorded_at = correct_timestamp(&reading.epoch_seconds).map_err(|e| e.to_string())?;
    Ok((reading, recorded_at))
}
