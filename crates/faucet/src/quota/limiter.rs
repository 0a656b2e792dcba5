//! Fixed-window per-address rate limiter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

use super::store::{QuotaRecord, QuotaStore, QuotaStoreResult};
use crate::clock::Clock;

/// Default key prefix, shared with records written by earlier deployments.
pub const DEFAULT_KEY_PREFIX: &str = "ratelimit:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPolicy {
    #[error("window must be longer than zero")]
    EmptyWindow,

    #[error("window of {0:?} is too long")]
    WindowTooLong(Duration),

    #[error("max_requests must be at least 1")]
    NoRequests,
}

/// How many requests an address may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    window: Duration,
    chrono_window: chrono::Duration,
    max_requests: u32,
}

impl QuotaPolicy {
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, InvalidPolicy> {
        if window.is_zero() {
            return Err(InvalidPolicy::EmptyWindow);
        }
        if max_requests == 0 {
            return Err(InvalidPolicy::NoRequests);
        }
        let chrono_window =
            chrono::Duration::from_std(window).map_err(|_| InvalidPolicy::WindowTooLong(window))?;

        Ok(Self {
            window,
            chrono_window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

/// Outcome of [`RateLimiter::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Read-only view returned by [`RateLimiter::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub count: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Per-address quota over a [`QuotaStore`].
///
/// The window origin is fixed at the first request: later requests carry the
/// original reset time forward instead of sliding it. Two concurrent first
/// requests for the same address may both write `count = 1`; the store's
/// last write wins and one request goes uncounted. No in-process lock is
/// taken around the read-modify-write.
pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    policy: QuotaPolicy,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, policy: QuotaPolicy) -> Self {
        Self::with_key_prefix(store, clock, policy, DEFAULT_KEY_PREFIX)
    }

    pub fn with_key_prefix(
        store: Arc<dyn QuotaStore>,
        clock: Arc<dyn Clock>,
        policy: QuotaPolicy,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Store key for an address. Addresses are case-insensitive.
    pub fn key(&self, address: &str) -> String {
        format!("{}{}", self.key_prefix, address.to_lowercase())
    }

    /// Admit one request for `address` if its window has room, consuming a
    /// slot. A denied request does not consume anything.
    pub async fn check_and_consume(&self, address: &str) -> QuotaStoreResult<QuotaDecision> {
        let key = self.key(address);
        let now = self.clock.now();
        let max = self.policy.max_requests;

        trace!(key = %key, "Checking quota");

        let active = self
            .store
            .get(&key)
            .await?
            .and_then(|record| remaining_ttl(&record, now).map(|ttl| (record, ttl)));

        let Some((record, ttl)) = active else {
            return self.start_window(&key, now).await;
        };

        if record.count >= max {
            debug!(key = %key, count = record.count, reset_at = %record.reset_at, "Quota exhausted");
            return Ok(QuotaDecision {
                allowed: false,
                remaining: 0,
                reset_at: record.reset_at,
            });
        }

        let updated = QuotaRecord {
            count: record.count + 1,
            reset_at: record.reset_at,
        };
        self.store.set_with_expiry(&key, &updated, ttl).await?;

        trace!(key = %key, count = updated.count, "Quota slot consumed");
        Ok(QuotaDecision {
            allowed: true,
            remaining: max - updated.count,
            reset_at: updated.reset_at,
        })
    }

    /// Current usage for `address`. Never consumes a slot.
    pub async fn inspect(&self, address: &str) -> QuotaStoreResult<QuotaSnapshot> {
        let key = self.key(address);
        let now = self.clock.now();
        let max = self.policy.max_requests;

        let snapshot = match self.store.get(&key).await? {
            Some(record) if record.reset_at > now => QuotaSnapshot {
                count: record.count,
                remaining: max.saturating_sub(record.count),
                reset_at: Some(record.reset_at),
            },
            _ => QuotaSnapshot {
                count: 0,
                remaining: max,
                reset_at: None,
            },
        };
        Ok(snapshot)
    }

    async fn start_window(&self, key: &str, now: DateTime<Utc>) -> QuotaStoreResult<QuotaDecision> {
        let record = QuotaRecord {
            count: 1,
            reset_at: now + self.policy.chrono_window,
        };
        self.store
            .set_with_expiry(key, &record, self.policy.window)
            .await?;

        debug!(key = %key, reset_at = %record.reset_at, "Started new quota window");
        Ok(QuotaDecision {
            allowed: true,
            remaining: self.policy.max_requests - 1,
            reset_at: record.reset_at,
        })
    }
}

/// Time left until `record` resets, `None` once it has reset.
fn remaining_ttl(record: &QuotaRecord, now: DateTime<Utc>) -> Option<Duration> {
    (record.reset_at - now)
        .to_std()
        .ok()
        .filter(|ttl| !ttl.is_zero())
}
