//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_transactions_total` - Transactions appended
//! - `ledger_payout_transitions_total` - Payout state transitions applied
//! - `ledger_drift_corrections_total` - Wallets repaired by reconciliation
//! - `ledger_payments_synced_total` - Payments credited by the external sync
//! - `ledger_append_duration_seconds` - Histogram of append latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each store owns its own registry so tests can open ledgers side by side.
#[derive(Clone)]
pub struct Metrics {
    /// Transactions appended
    pub transactions_total: IntCounter,

    /// Payout state transitions applied
    pub payout_transitions_total: IntCounter,

    /// Wallets repaired by reconciliation
    pub drift_corrections_total: IntCounter,

    /// Payments credited by the external sync
    pub payments_synced_total: IntCounter,

    /// Append duration histogram
    pub append_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total =
            IntCounter::new("ledger_transactions_total", "Transactions appended")?;
        registry.register(Box::new(transactions_total.clone()))?;

        let payout_transitions_total = IntCounter::new(
            "ledger_payout_transitions_total",
            "Payout state transitions applied",
        )?;
        registry.register(Box::new(payout_transitions_total.clone()))?;

        let drift_corrections_total = IntCounter::new(
            "ledger_drift_corrections_total",
            "Wallets repaired by reconciliation",
        )?;
        registry.register(Box::new(drift_corrections_total.clone()))?;

        let payments_synced_total = IntCounter::new(
            "ledger_payments_synced_total",
            "Payments credited by the external sync",
        )?;
        registry.register(Box::new(payments_synced_total.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        Ok(Self {
            transactions_total,
            payout_transitions_total,
            drift_corrections_total,
            payments_synced_total,
            append_duration,
            registry,
        })
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_total", &self.transactions_total.get())
            .field("payout_transitions_total", &self.payout_transitions_total.get())
            .finish()
    }
}
