//! Metrics collection for observability
//!
//! Prometheus counters for every ledger operation family plus a latency
//! histogram over writer turns. Each `Metrics` instance owns its own
//! registry, surfaced by the gateway at `/metrics`.

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Emission records created
    pub emissions_recorded_total: IntCounter,

    /// Emission records patched
    pub emission_updates_total: IntCounter,

    /// Verification records appended
    pub verifications_total: IntCounter,

    /// BANK/BORROW adjustments applied
    pub balance_adjustments_total: IntCounter,

    /// Cross-period banking operations
    pub banking_total: IntCounter,

    /// Cross-period borrowing operations
    pub borrowing_total: IntCounter,

    /// Pool allocations created
    pub allocations_total: IntCounter,

    /// EUA operations appended
    pub eua_operations_total: IntCounter,

    /// Operations rejected by a business-rule gate
    pub conflicts_total: IntCounter,

    /// Writer turn latency
    pub mutation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let emissions_recorded_total = IntCounter::new(
            "ledger_emissions_recorded_total",
            "Emission records created",
        )?;
        registry.register(Box::new(emissions_recorded_total.clone()))?;

        let emission_updates_total = IntCounter::new(
            "ledger_emission_updates_total",
            "Emission records patched",
        )?;
        registry.register(Box::new(emission_updates_total.clone()))?;

        let verifications_total = IntCounter::new(
            "ledger_verifications_total",
            "Verification records appended",
        )?;
        registry.register(Box::new(verifications_total.clone()))?;

        let balance_adjustments_total = IntCounter::new(
            "ledger_balance_adjustments_total",
            "BANK/BORROW adjustments applied",
        )?;
        registry.register(Box::new(balance_adjustments_total.clone()))?;

        let banking_total = IntCounter::new(
            "ledger_banking_total",
            "Cross-period banking operations",
        )?;
        registry.register(Box::new(banking_total.clone()))?;

        let borrowing_total = IntCounter::new(
            "ledger_borrowing_total",
            "Cross-period borrowing operations",
        )?;
        registry.register(Box::new(borrowing_total.clone()))?;

        let allocations_total = IntCounter::new(
            "ledger_pool_allocations_total",
            "Pool allocations created",
        )?;
        registry.register(Box::new(allocations_total.clone()))?;

        let eua_operations_total = IntCounter::new(
            "ledger_eua_operations_total",
            "EUA operations appended",
        )?;
        registry.register(Box::new(eua_operations_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "ledger_conflicts_total",
            "Operations rejected by a business-rule gate",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let mutation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mutation_duration_seconds",
                "Writer turn latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(mutation_duration.clone()))?;

        Ok(Self {
            emissions_recorded_total,
            emission_updates_total,
            verifications_total,
            balance_adjustments_total,
            banking_total,
            borrowing_total,
            allocations_total,
            eua_operations_total,
            conflicts_total,
            mutation_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
