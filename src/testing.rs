//! In-memory stores with injectable failures for exercising the drain.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::db::models::{AlertRule, Calibration, NewMeasurement, NewOccurrence};
use crate::db::{StoreError, TelemetryStore};
use crate::staging::StagingStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
pub struct MemoryStagingStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Keys reported by `list_keys` whose payload has already vanished.
    phantom_keys: Mutex<Vec<String>>,
    fail_list: Mutex<bool>,
    fail_delete: Mutex<HashSet<String>>,
    cancel_on_get: Mutex<Option<CancellationToken>>,
    yield_on_access: Mutex<bool>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, key: &str, payload: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), payload.as_bytes().to_vec());
    }

    pub fn add_phantom_key(&self, key: &str) {
        self.phantom_keys.lock().unwrap().push(key.to_owned());
    }

    pub fn fail_list(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_owned());
    }

    /// Cancel `token` as soon as the first payload is fetched.
    pub fn cancel_on_first_get(&self, token: CancellationToken) {
        *self.cancel_on_get.lock().unwrap() = Some(token);
    }

    /// Yield to the scheduler on every list/get/delete so concurrent drains
    /// interleave.
    pub fn yield_on_access(&self) {
        *self.yield_on_access.lock().unwrap() = true;
    }

    async fn maybe_yield(&self) {
        let yield_now = *self.yield_on_access.lock().unwrap();
        if yield_now {
            tokio::task::yield_now().await;
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl StagingStore for MemoryStagingStore {
    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.maybe_yield().await;
        if *self.fail_list.lock().unwrap() {
            return Err(unavailable());
        }
        let mut keys = self.keys();
        keys.extend(self.phantom_keys.lock().unwrap().iter().cloned());
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.maybe_yield().await;
        if let Some(token) = self.cancel_on_get.lock().unwrap().take() {
            token.cancel();
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.maybe_yield().await;
        if self.fail_delete.lock().unwrap().contains(key) {
            return Err(unavailable());
        }
        self.entries.lock().unwrap().remove(key);
        self.phantom_keys.lock().unwrap().retain(|k| k != key);
        self.deleted.lock().unwrap().push(key.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTelemetryStore {
    bindings: Mutex<Vec<(String, String, Calibration)>>,
    rules: Mutex<Vec<(String, AlertRule)>>,
    measurements: Mutex<Vec<NewMeasurement>>,
    occurrences: Mutex<Vec<NewOccurrence>>,
    fail_lookups: Mutex<HashSet<String>>,
    fail_rules: Mutex<HashSet<String>>,
    fail_measurements: Mutex<HashSet<i32>>,
    fail_occurrences: Mutex<HashSet<i32>>,
}

impl MemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, station_mac: &str, json_name: &str, sensor_id: i32, scale: f64, offset: f64) {
        self.bindings.lock().unwrap().push((
            station_mac.to_owned(),
            json_name.to_owned(),
            Calibration { sensor_id, scale_factor: scale, offset },
        ));
    }

    pub fn add_rule(&self, station_mac: &str, id: i32, json_name: &str, condition: &str, threshold: f64) {
        self.rules.lock().unwrap().push((
            station_mac.to_owned(),
            AlertRule {
                id,
                parameter_json_name: json_name.to_owned(),
                condition: condition.to_owned(),
                name: format!("rule {id}"),
                threshold,
            },
        ));
    }

    pub fn fail_lookups_for(&self, json_name: &str) {
        self.fail_lookups.lock().unwrap().insert(json_name.to_owned());
    }

    pub fn fail_rules_for(&self, station_mac: &str) {
        self.fail_rules.lock().unwrap().insert(station_mac.to_owned());
    }

    pub fn fail_measurements_for(&self, sensor_id: i32) {
        self.fail_measurements.lock().unwrap().insert(sensor_id);
    }

    pub fn fail_occurrences_for(&self, alert_id: i32) {
        self.fail_occurrences.lock().unwrap().insert(alert_id);
    }

    pub fn measurements(&self) -> Vec<NewMeasurement> {
        self.measurements.lock().unwrap().clone()
    }

    pub fn occurrences(&self) -> Vec<NewOccurrence> {
        self.occurrences.lock().unwrap().clone()
    }
}

impl TelemetryStore for MemoryTelemetryStore {
    async fn calibrations(
        &self,
        station_mac: &str,
        parameter_json_name: &str,
    ) -> Result<Vec<Calibration>, StoreError> {
        if self.fail_lookups.lock().unwrap().contains(parameter_json_name) {
            return Err(unavailable());
        }
        let mut found: Vec<Calibration> = self
            .bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|(mac, json, _)| mac == station_mac && json == parameter_json_name)
            .map(|(_, _, c)| *c)
            .collect();
        found.sort_by_key(|c| c.sensor_id);
        Ok(found)
    }

    async fn alert_rules(&self, station_mac: &str) -> Result<Vec<AlertRule>, StoreError> {
        if self.fail_rules.lock().unwrap().contains(station_mac) {
            return Err(unavailable());
        }
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|(mac, _)| mac == station_mac)
            .map(|(_, rule)| rule.clone())
            .collect())
    }

    async fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<i64, StoreError> {
        if self.fail_measurements.lock().unwrap().contains(&measurement.sensor_id) {
            return Err(unavailable());
        }
        let mut rows = self.measurements.lock().unwrap();
        rows.push(measurement.clone());
        Ok(rows.len() as i64)
    }

    async fn insert_occurrence(&self, occurrence: &NewOccurrence) -> Result<i64, StoreError> {
        if self.fail_occurrences.lock().unwrap().contains(&occurrence.alert_id) {
            return Err(unavailable());
        }
        let mut rows = self.occurrences.lock().unwrap();
        rows.push(occurrence.clone());
        Ok(rows.len() as i64)
    }
}
