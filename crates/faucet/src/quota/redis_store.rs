//! Redis-backed quota store.
//!
//! Shares quota state across faucet instances. Each record is a JSON string
//! written with `SET key value PX ttl`, so Redis owns expiry and a single
//! `SET` replaces the whole record atomically.
//!
//! Values that fail to decode are deleted and read as absent, which starts a
//! fresh window for that address.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use super::store::{QuotaRecord, QuotaStore, QuotaStoreError, QuotaStoreResult};

pub struct RedisQuotaStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisQuotaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQuotaStore").finish_non_exhaustive()
    }
}

impl RedisQuotaStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1/")
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(url: &str) -> QuotaStoreResult<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis quota store");
        Ok(Self { connection })
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> QuotaStoreResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn get(&self, key: &str) -> QuotaStoreResult<Option<QuotaRecord>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(key).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<QuotaRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable quota record");
                let _: () = conn.del(key).await?;
                Ok(None)
            }
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        record: &QuotaRecord,
        ttl: Duration,
    ) -> QuotaStoreResult<()> {
        let value = serde_json::to_string(record)?;
        // PX 0 is rejected by Redis
        let ttl_ms = u64::try_from(ttl.as_millis())
            .map_err(|_| QuotaStoreError::Encoding("ttl out of range".to_string()))?
            .max(1);

        let mut conn = self.connection.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! These tests require a Redis instance at `redis://127.0.0.1/`.
    //! Run with `cargo test -p tempo-faucet -- --ignored`.

    use super::*;
    use chrono::Utc;

    const URL: &str = "redis://127.0.0.1/";

    fn key(test: &str) -> String {
        format!("test:quota:{}:{}", test, std::process::id())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_set_get_round_trip() {
        let store = RedisQuotaStore::connect(URL).await.unwrap();
        let key = key("round_trip");
        let record = QuotaRecord {
            count: 2,
            reset_at: Utc::now() + chrono::Duration::seconds(30),
        };

        store
            .set_with_expiry(&key, &record, Duration::from_secs(30))
            .await
            .unwrap();
        let read = store.get(&key).await.unwrap().unwrap();

        assert_eq!(read.count, 2);
        assert_eq!(read.reset_at.timestamp_millis(), record.reset_at.timestamp_millis());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_expiry() {
        let store = RedisQuotaStore::connect(URL).await.unwrap();
        let key = key("expiry");
        let record = QuotaRecord {
            count: 1,
            reset_at: Utc::now(),
        };

        store
            .set_with_expiry(&key, &record, Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_garbage_value_reads_absent() {
        let store = RedisQuotaStore::connect(URL).await.unwrap();
        let key = key("garbage");

        let mut conn = store.connection.clone();
        let _: () = conn.set_ex(&key, "not json", 30).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), None);
        let exists: bool = conn.exists(&key).await.unwrap();
        assert!(!exists);
    }
}
