//! Faucet configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tempo_faucet_common::utils::logging::LoggingConfig;

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::LedgerOptions;
use crate::orchestrator::OrchestratorOptions;
use crate::quota::{QuotaPolicy, DEFAULT_KEY_PREFIX};

pub const DEFAULT_RPC_URL: &str = "https://rpc.moderato.tempo.xyz";
pub const DEFAULT_EXPLORER_URL: &str = "https://explore.tempo.xyz";

/// Faucet service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub rate_limit: RateLimitConfig,
    pub quota_store: QuotaStoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Unrecognized values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub environment: Environment,
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            environment: Environment::Development,
            cors_enabled: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,

    /// Service wallet key, hex with optional `0x`
    pub private_key: String,

    pub request_timeout_ms: u64,

    /// Wait after a replenishment before re-reading the balance
    pub replenish_grace_ms: u64,

    pub receipt_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,

    /// Fixed gas limit; estimated per transfer when unset
    pub gas_limit: Option<u64>,

    pub explorer_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            private_key: String::new(),
            request_timeout_ms: 10_000,
            replenish_grace_ms: 2_000,
            receipt_timeout_ms: 30_000,
            receipt_poll_interval_ms: 500,
            gas_limit: None,
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        }
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("replenish_grace_ms", &self.replenish_grace_ms)
            .field("receipt_timeout_ms", &self.receipt_timeout_ms)
            .field("receipt_poll_interval_ms", &self.receipt_poll_interval_ms)
            .field("gas_limit", &self.gas_limit)
            .field("explorer_url", &self.explorer_url)
            .finish()
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn replenish_grace(&self) -> Duration {
        Duration::from_millis(self.replenish_grace_ms)
    }

    pub fn options(&self) -> LedgerOptions {
        LedgerOptions {
            request_timeout: self.request_timeout(),
            gas_limit: self.gas_limit,
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_millis(self.receipt_timeout_ms),
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        let request = self.request_timeout();
        OrchestratorOptions {
            call_timeout: request,
            // a transfer makes at most six RPC round trips before polling for its receipt
            transfer_timeout: Duration::from_millis(self.receipt_timeout_ms) + request * 6,
            replenish_grace: self.replenish_grace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 86_400_000,
            max_requests: 3,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaBackend {
    Memory,
    Redis,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaStoreConfig {
    pub backend: QuotaBackend,

    /// Full connection URL; takes precedence over host, port and password
    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub redis_password: Option<String>,

    pub key_prefix: String,

    /// How often the in-memory backend sweeps expired records
    pub purge_interval_secs: u64,
}

impl Default for QuotaStoreConfig {
    fn default() -> Self {
        Self {
            backend: QuotaBackend::Memory,
            redis_url: None,
            redis_host: None,
            redis_port: 6379,
            redis_password: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            purge_interval_secs: 60,
        }
    }
}

impl fmt::Debug for QuotaStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaStoreConfig")
            .field("backend", &self.backend)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "<redacted>"))
            .field("key_prefix", &self.key_prefix)
            .field("purge_interval_secs", &self.purge_interval_secs)
            .finish()
    }
}

impl QuotaStoreConfig {
    /// Connection URL for the Redis backend, assembled from host, port and
    /// password when no `redis_url` is given. `None` when neither is set.
    pub fn redis_connection_url(&self) -> FaucetResult<Option<String>> {
        if let Some(url) = &self.redis_url {
            return Ok(Some(url.clone()));
        }
        let Some(host) = self.redis_host.as_deref() else {
            return Ok(None);
        };

        let invalid = |what: &str| FaucetError::Config(format!("invalid Redis {}", what));
        let mut url = reqwest::Url::parse("redis://localhost/").map_err(|_| invalid("URL"))?;
        url.set_host(Some(host)).map_err(|_| invalid("host"))?;
        url.set_port(Some(self.redis_port))
            .map_err(|_| invalid("port"))?;
        if let Some(password) = self.redis_password.as_deref() {
            url.set_password(Some(password))
                .map_err(|_| invalid("password"))?;
        }
        Ok(Some(url.to_string()))
    }
}

impl FaucetConfig {
    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> FaucetResult<()> {
        if self.ledger.private_key.trim().is_empty() {
            return Err(FaucetError::Config(
                "SERVICE_WALLET_PRIVATE_KEY is required".to_string(),
            ));
        }
        if self.ledger.rpc_url.trim().is_empty() {
            return Err(FaucetError::Config("TEMPO_RPC_URL is required".to_string()));
        }
        if self.ledger.request_timeout_ms == 0 {
            return Err(FaucetError::Config(
                "ledger.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.quota_store.backend == QuotaBackend::Redis
            && self.quota_store.redis_connection_url()?.is_none()
        {
            return Err(FaucetError::Config(
                "REDIS_URL or REDIS_HOST is required for the redis quota backend".to_string(),
            ));
        }
        self.policy()?;
        Ok(())
    }

    pub fn policy(&self) -> FaucetResult<QuotaPolicy> {
        QuotaPolicy::new(self.rate_limit.window(), self.rate_limit.max_requests)
            .map_err(|e| FaucetError::Config(format!("rate limit: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempo_faucet_common::utils::config::load_config;

    fn valid() -> FaucetConfig {
        let mut config = FaucetConfig::default();
        config.ledger.private_key = "11".repeat(32);
        config
    }

    #[test]
    fn test_defaults() {
        let config = FaucetConfig::default();
        assert_eq!(config.server.listen_addr.port(), 3000);
        assert_eq!(config.rate_limit.window(), Duration::from_millis(86_400_000));
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.ledger.replenish_grace(), Duration::from_secs(2));
        assert_eq!(config.quota_store.key_prefix, "ratelimit:");
        assert_eq!(config.ledger.rpc_url, DEFAULT_RPC_URL);

        let options = config.ledger.orchestrator_options();
        assert_eq!(options.call_timeout, Duration::from_secs(10));
        assert_eq!(options.transfer_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            FaucetConfig::default().validate(),
            Err(FaucetError::Config(_))
        ));
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.quota_store.backend = QuotaBackend::Redis;
        assert!(config.validate().is_err());
        config.quota_store.redis_url = Some("redis://127.0.0.1/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("Development"), Environment::Development);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains(&"11".repeat(32)));
    }

    #[test]
    fn test_redis_url_from_host_port_password() {
        let mut store = QuotaStoreConfig::default();
        assert_eq!(store.redis_connection_url().unwrap(), None);

        store.redis_host = Some("cache.internal".to_string());
        assert_eq!(
            store.redis_connection_url().unwrap().as_deref(),
            Some("redis://cache.internal:6379/")
        );

        store.redis_port = 6380;
        store.redis_password = Some("p@ss:word".to_string());
        assert_eq!(
            store.redis_connection_url().unwrap().as_deref(),
            Some("redis://:p%40ss%3Aword@cache.internal:6380/")
        );

        store.redis_url = Some("redis://primary:6379/".to_string());
        assert_eq!(
            store.redis_connection_url().unwrap().as_deref(),
            Some("redis://primary:6379/")
        );
    }

    #[test]
    fn test_redis_backend_accepts_host_only() {
        let mut config = valid();
        config.quota_store.backend = QuotaBackend::Redis;
        config.quota_store.redis_host = Some("cache".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_redis_password() {
        let mut config = valid();
        config.quota_store.redis_password = Some("hunter2".to_string());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[rate_limit]\nmax_requests = 5\n\n[quota_store]\nbackend = \"redis\"\nredis_url = \"redis://cache:6379\""
        )
        .unwrap();

        let config: FaucetConfig = load_config(file.path()).unwrap();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_ms, 86_400_000);
        assert_eq!(config.quota_store.backend, QuotaBackend::Redis);
        assert_eq!(config.server.listen_addr.port(), 3000);
    }
}
