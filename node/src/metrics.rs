//! Prometheus metrics for the tally node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; callers that expose metrics
//! encode it into the Prometheus text format with [`NodeMetrics::encode`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Transfers applied to the ledger.
    pub transfers_accepted: IntCounter,
    /// Transfers answered from the idempotency index.
    pub transfers_replayed: IntCounter,
    /// Transfers rejected for any reason.
    pub transfers_rejected: IntCounter,
    pub blocks_sealed: IntCounter,
    /// System-issued levy transactions minted.
    pub levy_transactions: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Height of the chain tip; -1 before the first block.
    pub chain_height: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of the nonce search, in milliseconds.
    pub mining_time_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transfers_accepted = register_int_counter_with_registry!(
            Opts::new("tally_transfers_accepted_total", "Transfers applied to the ledger"),
            registry
        )
        .expect("failed to register transfers_accepted counter");

        let transfers_replayed = register_int_counter_with_registry!(
            Opts::new(
                "tally_transfers_replayed_total",
                "Transfers answered from the idempotency index"
            ),
            registry
        )
        .expect("failed to register transfers_replayed counter");

        let transfers_rejected = register_int_counter_with_registry!(
            Opts::new("tally_transfers_rejected_total", "Transfers rejected"),
            registry
        )
        .expect("failed to register transfers_rejected counter");

        let blocks_sealed = register_int_counter_with_registry!(
            Opts::new("tally_blocks_sealed_total", "Blocks sealed by this node"),
            registry
        )
        .expect("failed to register blocks_sealed counter");

        let levy_transactions = register_int_counter_with_registry!(
            Opts::new(
                "tally_levy_transactions_total",
                "System-issued levy transactions minted"
            ),
            registry
        )
        .expect("failed to register levy_transactions counter");

        let chain_height = register_int_gauge_with_registry!(
            Opts::new("tally_chain_height", "Height of the chain tip"),
            registry
        )
        .expect("failed to register chain_height gauge");
        chain_height.set(-1);

        // 1 ms to ~9 hours
        let mining_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("tally_mining_time_ms", "Nonce search time in milliseconds")
                .buckets(
                    prometheus::exponential_buckets(1.0, 4.0, 13)
                        .expect("static histogram buckets are valid")
                ),
            registry
        )
        .expect("failed to register mining_time_ms histogram");

        Self {
            registry,
            transfers_accepted,
            transfers_replayed,
            transfers_rejected,
            blocks_sealed,
            levy_transactions,
            chain_height,
            mining_time_ms,
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
