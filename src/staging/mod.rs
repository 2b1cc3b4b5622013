mod reading;

pub use reading::{parse_raw_value, StagedReading};

use std::future::Future;

use sqlx::PgPool;

use crate::db::StoreError;

/// String-keyed blob buffer between the ingestion endpoint and the drain.
///
/// Entries persist until explicitly deleted; there is no TTL. Writing is the
/// ingestion endpoint's job, so the drain only reads and deletes.
pub trait StagingStore: Send + Sync {
    /// Snapshot of every key staged at call time.
    fn list_keys(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Staging buffer kept in the `staged_readings` table.
#[derive(Debug, Clone)]
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stage `payload` under `key`, replacing any previous payload.
    #[cfg(test)]
    pub async fn put(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO staged_readings (key, payload)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
                SET payload = EXCLUDED.payload,
                    staged_at = now()
            "#,
        )
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl StagingStore for PgStagingStore {
    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM staged_readings ORDER BY staged_at ASC, key ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let payload = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT payload FROM staged_readings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payload)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM staged_readings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn put_get_list_delete(pool: PgPool) {
        let store = PgStagingStore::new(pool);

        store.put("M1:1700000000", br#"{"uid":"M1"}"#).await.unwrap();
        store
            .put("M1:1700000060", br#"{"uid":"M1","uxt":"1700000060"}"#)
            .await
            .unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"M1:1700000000".to_owned()));

        assert_eq!(
            store.get("M1:1700000000").await.unwrap().as_deref(),
            Some(br#"{"uid":"M1"}"#.as_slice())
        );
        assert!(store.get("missing").await.unwrap().is_none());

        store.delete("M1:1700000000").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["M1:1700000060".to_owned()]);

        // Deleting an absent key is not an error.
        store.delete("M1:1700000000").await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn put_replaces_existing_payload(pool: PgPool) {
        let store = PgStagingStore::new(pool);

        store.put("k", b"first").await.unwrap();
        store.put("k", b"second").await.unwrap();

        assert_eq!(store.list_keys().await.unwrap().len(), 1);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(b"second".as_slice()));
    }
}
