//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the promotion engine reports.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the engine.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    promotions_total: IntCounterVec,
    promotion_paths_total: IntCounterVec,
    promotion_rollbacks_total: IntCounterVec,
    pool_rejections_total: IntCounterVec,
    nfc_invalidations_total: IntCounterVec,
    promotions_in_flight: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Promotions currently executing.
    pub promotions_in_flight: i64,
    /// Promotions that finished successfully, across kinds.
    pub promotions_succeeded: u64,
    /// Promotions that finished with a failure, across kinds.
    pub promotions_failed: u64,
    /// Rollbacks performed, across kinds.
    pub rollbacks_total: u64,
    /// Pool submissions rejected for overload, across pools.
    pub pool_rejections_total: u64,
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

const PROMOTION_KINDS: [&str; 2] = ["paths", "group"];
const POOLS: [&str; 2] = ["promotion", "transfer"];

fn sum_outcome(family: &IntCounterVec, outcome: &str) -> u64 {
    PROMOTION_KINDS
        .iter()
        .map(|kind| family.with_label_values(&[*kind, outcome]).get())
        .sum()
}

fn sum_labels(family: &IntCounterVec, values: &[&str]) -> u64 {
    values
        .iter()
        .map(|value| family.with_label_values(&[*value]).get())
        .sum()
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let promotions_total = counter_vec(
            "promotions_total",
            "Promotions finished by kind and outcome",
            &["kind", "outcome"],
        )?;
        let promotion_paths_total = counter_vec(
            "promotion_paths_total",
            "Paths handled by successful promotions by status",
            &["status"],
        )?;
        let promotion_rollbacks_total = counter_vec(
            "promotion_rollbacks_total",
            "Promotion rollbacks performed by kind",
            &["kind"],
        )?;
        let pool_rejections_total = counter_vec(
            "promotion_pool_rejections_total",
            "Work rejected by an overloaded worker pool",
            &["pool"],
        )?;
        let nfc_invalidations_total = counter_vec(
            "nfc_invalidations_total",
            "Negative-cache invalidation tasks by outcome",
            &["outcome"],
        )?;
        let promotions_in_flight = IntGauge::with_opts(Opts::new(
            "promotions_in_flight",
            "Promotions currently executing",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "promotions_in_flight",
            source,
        })?;

        register(&registry, "promotions_total", &promotions_total)?;
        register(&registry, "promotion_paths_total", &promotion_paths_total)?;
        register(
            &registry,
            "promotion_rollbacks_total",
            &promotion_rollbacks_total,
        )?;
        register(
            &registry,
            "promotion_pool_rejections_total",
            &pool_rejections_total,
        )?;
        register(&registry, "nfc_invalidations_total", &nfc_invalidations_total)?;
        register(&registry, "promotions_in_flight", &promotions_in_flight)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                promotions_total,
                promotion_paths_total,
                promotion_rollbacks_total,
                pool_rejections_total,
                nfc_invalidations_total,
                promotions_in_flight,
            }),
        })
    }

    /// Count a finished promotion.
    pub fn inc_promotion(&self, kind: &str, outcome: &str) {
        self.inner
            .promotions_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Add `count` paths with the given status.
    pub fn add_paths(&self, status: &str, count: usize) {
        self.inner
            .promotion_paths_total
            .with_label_values(&[status])
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Count a rollback.
    pub fn inc_rollback(&self, kind: &str) {
        self.inner
            .promotion_rollbacks_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a rejected pool submission.
    pub fn inc_pool_rejection(&self, pool: &str) {
        self.inner
            .pool_rejections_total
            .with_label_values(&[pool])
            .inc();
    }

    /// Count a finished negative-cache invalidation task.
    pub fn inc_nfc_invalidation(&self, outcome: &str) {
        self.inner
            .nfc_invalidations_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Mark a promotion as started.
    pub fn promotion_started(&self) {
        self.inner.promotions_in_flight.inc();
    }

    /// Mark a promotion as finished.
    pub fn promotion_finished(&self) {
        self.inner.promotions_in_flight.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            promotions_in_flight: self.inner.promotions_in_flight.get(),
            promotions_succeeded: sum_outcome(&self.inner.promotions_total, "succeeded"),
            promotions_failed: sum_outcome(&self.inner.promotions_total, "failed"),
            rollbacks_total: sum_labels(&self.inner.promotion_rollbacks_total, &PROMOTION_KINDS),
            pool_rejections_total: sum_labels(&self.inner.pool_rejections_total, &POOLS),
        }
    }

    /// Current value of `promotion_paths_total` for `status`.
    #[must_use]
    pub fn paths_with_status(&self, status: &str) -> u64 {
        self.inner
            .promotion_paths_total
            .with_label_values(&[status])
            .get()
    }

    /// Current value of `nfc_invalidations_total` for `outcome`.
    #[must_use]
    pub fn nfc_invalidations(&self, outcome: &str) -> u64 {
        self.inner
            .nfc_invalidations_total
            .with_label_values(&[outcome])
            .get()
    }
}
