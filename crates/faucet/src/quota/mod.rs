//! Per-address request quotas and the stores that back them.

mod limiter;
mod memory;
mod redis_store;
mod store;

pub use limiter::{
    InvalidPolicy, QuotaDecision, QuotaPolicy, QuotaSnapshot, RateLimiter, DEFAULT_KEY_PREFIX,
};
pub use memory::MemoryQuotaStore;
pub use redis_store::RedisQuotaStore;
pub use store::{QuotaRecord, QuotaStore, QuotaStoreError, QuotaStoreResult};
