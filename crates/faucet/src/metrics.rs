//! Prometheus metrics for the faucet.

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

lazy_static! {
    pub static ref FUNDING_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("faucet_funding_requests_total", "Total number of funding requests"),
        &["token", "outcome"]  // success | rate_limited | insufficient_funds | ...
    ).unwrap();

    pub static ref RATE_LIMIT_DENIALS_TOTAL: IntCounter = IntCounter::new(
        "faucet_rate_limit_denials_total",
        "Requests denied because the address quota was exhausted"
    ).unwrap();

    pub static ref REPLENISH_TOTAL: CounterVec = CounterVec::new(
        Opts::new("faucet_replenish_total", "Service wallet replenishment attempts"),
        &["outcome"]  // success | failure
    ).unwrap();

    pub static ref TRANSFER_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("faucet_transfer_duration_seconds", "Time from submission to receipt")
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0])
    ).unwrap();
}

/// Owns the registry the `/metrics` endpoint renders.
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        registry.register(Box::new(FUNDING_REQUESTS_TOTAL.clone()))?;
        registry.register(Box::new(RATE_LIMIT_DENIALS_TOTAL.clone()))?;
        registry.register(Box::new(REPLENISH_TOTAL.clone()))?;
        registry.register(Box::new(TRANSFER_DURATION.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    /// Gather metrics as Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn record_funding(token: &str, outcome: &str) {
    FUNDING_REQUESTS_TOTAL
        .with_label_values(&[token, outcome])
        .inc();
}

pub fn record_replenish(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    REPLENISH_TOTAL.with_label_values(&[outcome]).inc();
}
