//! In-process quota store.
//!
//! Expiry is checked on access and swept by [`MemoryQuotaStore::purge_expired`].
//! Quota state is local to the process, so this backend only suits
//! single-instance deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::store::{QuotaRecord, QuotaStore, QuotaStoreError, QuotaStoreResult};
use crate::clock::Clock;

#[derive(Debug, Clone, Copy)]
struct Entry {
    record: QuotaRecord,
    expires_at: DateTime<Utc>,
}

pub struct MemoryQuotaStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryQuotaStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Drop every entry whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired quota records");
        }
        removed
    }

    /// Number of live or not-yet-purged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get(&self, key: &str) -> QuotaStoreResult<Option<QuotaRecord>> {
        let now = self.clock.now();
        // remove_if holds the shard lock, so a concurrent set is never lost
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);

        Ok(self.entries.get(key).map(|entry| entry.record))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        record: &QuotaRecord,
        ttl: Duration,
    ) -> QuotaStoreResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| QuotaStoreError::Encoding(format!("ttl out of range: {}", e)))?;
        let expires_at = self.clock.now() + ttl;

        trace!(key, count = record.count, %expires_at, "Storing quota record");
        self.entries.insert(
            key.to_string(),
            Entry {
                record: *record,
                expires_at,
            },
        );
        Ok(())
    }
}
