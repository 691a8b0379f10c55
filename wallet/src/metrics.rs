//! # Prometheus Metrics
//!
//! Counts how each operation run ended and records what the store holds
//! once a sync finishes. The binary prints the text exposition on request;
//! there is no scrape endpoint.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] prefixed with
//! `nova_wallet_`.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Metric handles for one `sync` invocation.
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    /// Operation runs by operation id and outcome label.
    pub operations_total: IntCounterVec,
    /// Accounts synced.
    pub accounts_synced: IntGauge,
    /// Tokens with a non-zero balance across all synced accounts.
    pub tokens_held: IntGauge,
    /// Transactions cached across all synced accounts.
    pub transactions_cached: IntGauge,
    /// Wall-clock duration of one account's sync, in seconds.
    pub account_sync_seconds: Histogram,
}

impl SyncMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("nova_wallet".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Operation runs by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let accounts_synced = IntGauge::new("accounts_synced", "Accounts synced")?;
        registry.register(Box::new(accounts_synced.clone()))?;

        let tokens_held = IntGauge::new(
            "tokens_held",
            "Tokens with a non-zero balance across synced accounts",
        )?;
        registry.register(Box::new(tokens_held.clone()))?;

        let transactions_cached = IntGauge::new(
            "transactions_cached",
            "Transactions cached across synced accounts",
        )?;
        registry.register(Box::new(transactions_cached.clone()))?;

        let account_sync_seconds = Histogram::with_opts(
            HistogramOpts::new("account_sync_seconds", "Duration of one account's sync")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(account_sync_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            accounts_synced,
            tokens_held,
            transactions_cached,
            account_sync_seconds,
        })
    }

    /// Counts one run of `operation` that ended with `outcome`.
    pub fn record(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
