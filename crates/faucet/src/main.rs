//! Faucet service binary

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempo_faucet::api::{self, ApiSettings, AppState};
use tempo_faucet::clock::{Clock, SystemClock};
use tempo_faucet::config::{Environment, FaucetConfig, QuotaBackend};
use tempo_faucet::ledger::{ServiceWallet, TempoLedgerClient};
use tempo_faucet::metrics::MetricsCollector;
use tempo_faucet::quota::{MemoryQuotaStore, QuotaStore, RateLimiter, RedisQuotaStore};
use tempo_faucet::{FaucetService, FundingOrchestrator};
use tempo_faucet_common::utils::config::load_config;
use tempo_faucet_common::utils::logging::init_logging;
use tokio::signal;
use tracing::{debug, info};

/// Tempo testnet faucet
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path (TOML, YAML or JSON)
    #[arg(short, long, env = "FAUCET_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Tempo JSON-RPC endpoint
    #[arg(long, env = "TEMPO_RPC_URL")]
    rpc_url: Option<String>,

    /// Service wallet private key
    #[arg(long, env = "SERVICE_WALLET_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Redis URL; selects the Redis quota store when set
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    redis_url: Option<String>,

    /// Redis host, used when no URL is given; selects the Redis quota store
    #[arg(long, env = "REDIS_HOST")]
    redis_host: Option<String>,

    #[arg(long, env = "REDIS_PORT")]
    redis_port: Option<u16>,

    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    /// Rate limit window (milliseconds)
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS")]
    rate_limit_window_ms: Option<u64>,

    /// Requests allowed per address per window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS")]
    rate_limit_max_requests: Option<u32>,

    /// development or production
    #[arg(long, env = "NODE_ENV")]
    environment: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Print the service wallet address and exit
    Address,
}

impl Cli {
    fn load(&self) -> Result<FaucetConfig> {
        let mut config: FaucetConfig = match &self.config {
            Some(path) => load_config(path)?,
            None => FaucetConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.listen_addr.set_port(port);
        }
        if let Some(env) = &self.environment {
            config.server.environment = Environment::parse(env);
        }
        if let Some(url) = &self.rpc_url {
            config.ledger.rpc_url = url.clone();
        }
        if let Some(key) = &self.private_key {
            config.ledger.private_key = key.clone();
        }
        if let Some(url) = &self.redis_url {
            config.quota_store.backend = QuotaBackend::Redis;
            config.quota_store.redis_url = Some(url.clone());
        }
        if let Some(host) = &self.redis_host {
            config.quota_store.backend = QuotaBackend::Redis;
            config.quota_store.redis_host = Some(host.clone());
        }
        if let Some(port) = self.redis_port {
            config.quota_store.redis_port = port;
        }
        if let Some(password) = &self.redis_password {
            config.quota_store.redis_password = Some(password.clone());
        }
        if let Some(window) = self.rate_limit_window_ms {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = self.rate_limit_max_requests {
            config.rate_limit.max_requests = max;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load()?;

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Address => {
            let wallet = ServiceWallet::from_private_key(&config.ledger.private_key)
                .context("invalid SERVICE_WALLET_PRIVATE_KEY")?;
            println!("{}", wallet.address());
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: FaucetConfig) -> Result<()> {
    config.validate()?;
    debug!(?config, "Loaded configuration");

    info!("Starting Tempo faucet v{}", env!("CARGO_PKG_VERSION"));

    let wallet = ServiceWallet::from_private_key(&config.ledger.private_key)
        .context("invalid SERVICE_WALLET_PRIVATE_KEY")?;
    let ledger = Arc::new(TempoLedgerClient::new(
        &config.ledger.rpc_url,
        wallet,
        config.ledger.options(),
    )?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = quota_store(&config, clock.clone()).await?;
    let limiter = RateLimiter::with_key_prefix(
        store,
        clock,
        config.policy()?,
        config.quota_store.key_prefix.clone(),
    );

    let orchestrator = FundingOrchestrator::new(ledger, config.ledger.orchestrator_options());
    let service = Arc::new(FaucetService::new(limiter, orchestrator));

    info!(
        wallet = %service.service_address(),
        env = %config.server.environment,
        max_requests = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        "Faucet service initialized"
    );

    let state = AppState {
        service,
        metrics: MetricsCollector::new().context("failed to register metrics")?,
        settings: Arc::new(ApiSettings::from_config(&config)),
    };
    let app = api::router(state);

    let addr: SocketAddr = config.server.listen_addr;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

async fn quota_store(config: &FaucetConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn QuotaStore>> {
    match config.quota_store.backend {
        QuotaBackend::Redis => {
            let url = config
                .quota_store
                .redis_connection_url()?
                .context("REDIS_URL or REDIS_HOST is required for the redis quota backend")?;
            let store = RedisQuotaStore::connect(&url)
                .await
                .context("failed to connect to Redis")?;
            store.ping().await.context("Redis did not answer PING")?;
            Ok(Arc::new(store))
        }
        QuotaBackend::Memory => {
            let store = Arc::new(MemoryQuotaStore::new(clock));
            info!("Using in-memory quota store (single instance only)");

            let sweeper = store.clone();
            let period = Duration::from_secs(config.quota_store.purge_interval_secs.max(1));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    sweeper.purge_expired();
                }
            });

            let store: Arc<dyn QuotaStore> = store;
            Ok(store)
        }
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
