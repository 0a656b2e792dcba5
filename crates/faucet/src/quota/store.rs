//! Quota store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Per-address counter for the current window.
///
/// Stored as `{"count":N,"resetAt":<epoch millis>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub count: u32,
    #[serde(rename = "resetAt", with = "chrono::serde::ts_milliseconds")]
    pub reset_at: DateTime<Utc>,
}

/// Infrastructure fault talking to the quota store. Always retryable from
/// the caller's point of view; never means "allowed" or "denied".
#[derive(Error, Debug)]
pub enum QuotaStoreError {
    #[error("quota store unavailable: {0}")]
    Unavailable(String),

    #[error("quota record encoding failed: {0}")]
    Encoding(String),
}

impl From<redis::RedisError> for QuotaStoreError {
    fn from(err: redis::RedisError) -> Self {
        QuotaStoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for QuotaStoreError {
    fn from(err: serde_json::Error) -> Self {
        QuotaStoreError::Encoding(err.to_string())
    }
}

pub type QuotaStoreResult<T> = std::result::Result<T, QuotaStoreError>;

/// TTL-based key/value store for quota records.
///
/// Single-key operations must be atomic with respect to concurrent callers,
/// and a key whose TTL has elapsed must read as absent.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get(&self, key: &str) -> QuotaStoreResult<Option<QuotaRecord>>;

    /// Create or replace `key` so that it expires after `ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        record: &QuotaRecord,
        ttl: Duration,
    ) -> QuotaStoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_wire_format() {
        let record = QuotaRecord {
            count: 2,
            reset_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"count":2,"resetAt":1700000000123}"#);

        let parsed: QuotaRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
