use std::future::Future;

use sqlx::PgPool;
use thiserror::Error;

use super::models::{AlertRule, Calibration, NewMeasurement, NewOccurrence};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reference lookups and append-only writes used by the drain.
pub trait TelemetryStore: Send + Sync {
    /// Every calibration bound to `(station_mac, parameter_json_name)`,
    /// ordered by sensor id.
    fn calibrations(
        &self,
        station_mac: &str,
        parameter_json_name: &str,
    ) -> impl Future<Output = Result<Vec<Calibration>, StoreError>> + Send;

    /// All alert rules configured for the station, tagged with the json name
    /// of the parameter each one watches.
    fn alert_rules(
        &self,
        station_mac: &str,
    ) -> impl Future<Output = Result<Vec<AlertRule>, StoreError>> + Send;

    fn insert_measurement(
        &self,
        measurement: &NewMeasurement,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn insert_occurrence(
        &self,
        occurrence: &NewOccurrence,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgTelemetryStore {
    pool: PgPool,
}

impl PgTelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TelemetryStore for PgTelemetryStore {
    async fn calibrations(
        &self,
        station_mac: &str,
        parameter_json_name: &str,
    ) -> Result<Vec<Calibration>, StoreError> {
        let rows = sqlx::query_as::<_, Calibration>(
            r#"
            SELECT sensor.id                AS sensor_id,
                   parametro.fator          AS scale_factor,
                   parametro.valor_offset   AS "offset"
            FROM estacao
            JOIN sensorestacao ON estacao.id  = sensorestacao.id_estacao
            JOIN sensor        ON sensor.id   = sensorestacao.id_sensor
            JOIN parametro     ON parametro.id = sensor.id_parametro
            WHERE estacao.mac_address = $1
              AND parametro.nome_json = $2
            ORDER BY sensor.id ASC
            "#,
        )
        .bind(station_mac)
        .bind(parameter_json_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn alert_rules(&self, station_mac: &str) -> Result<Vec<AlertRule>, StoreError> {
        let rows = sqlx::query_as::<_, AlertRule>(
            r#"
            SELECT alerta.id,
                   parametro.nome_json AS parameter_json_name,
                   alerta.condicao     AS "condition",
                   alerta.nome         AS name,
                   alerta.valor        AS threshold
            FROM alerta
            JOIN estacao   ON alerta.id_estacao   = estacao.id
            JOIN parametro ON alerta.id_parametro = parametro.id
            WHERE estacao.mac_address = $1
            ORDER BY alerta.id ASC
            "#,
        )
        .bind(station_mac)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO medicao (id_sensor, data_hora, valor_calculado)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(measurement.sensor_id)
        .bind(measurement.recorded_at)
        .bind(measurement.calibrated_value)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_occurrence(&self, occurrence: &NewOccurrence) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ocorrencia (id_alerta, data_hora, valor)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(occurrence.alert_id)
        .bind(occurrence.recorded_at)
        .bind(occurrence.value)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
