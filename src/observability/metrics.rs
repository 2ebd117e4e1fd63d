//! # Metrics
//!
//! Prometheus metrics for monitoring the controller and the admission webhook.
//!
//! ## Metrics Exposed
//!
//! - `secret_immutability_reconciliations_total` - Total number of reconciliations
//! - `secret_immutability_reconciliation_errors_total` - Total number of reconciliation errors
//! - `secret_immutability_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `secret_immutability_secrets_tagged_total` - Secrets marked immutable by the controller
//! - `secret_immutability_protected_secrets_discovered_total` - Secrets newly added to `allProtectedSecrets`
//! - `secret_immutability_requeues_total` - Requeued requests by reason
//! - `secret_immutability_admission_decisions_total` - Admission decisions by operation and result
//! - `secret_immutability_queue_depth` - Requests waiting in the work queue

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_immutability_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_immutability_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "secret_immutability_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static SECRETS_TAGGED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_immutability_secrets_tagged_total",
        "Total number of secrets marked immutable",
    )
    .expect("Failed to create SECRETS_TAGGED_TOTAL metric - this should never happen")
});

static PROTECTED_SECRETS_DISCOVERED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_immutability_protected_secrets_discovered_total",
        "Total number of secrets newly recorded as protected",
    )
    .expect(
        "Failed to create PROTECTED_SECRETS_DISCOVERED_TOTAL metric - this should never happen",
    )
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_immutability_requeues_total",
            "Total number of requeued reconcile requests by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static ADMISSION_DECISIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_immutability_admission_decisions_total",
            "Total number of admission decisions by operation and result",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create ADMISSION_DECISIONS_TOTAL metric - this should never happen")
});

static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secret_immutability_queue_depth",
        "Number of reconcile requests waiting in the work queue",
    )
    .expect("Failed to create QUEUE_DEPTH metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_TAGGED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROTECTED_SECRETS_DISCOVERED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_DECISIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_secrets_tagged(count: usize) {
    SECRETS_TAGGED_TOTAL.inc_by(count as u64);
}

pub fn increment_protected_secrets_discovered(count: usize) {
    PROTECTED_SECRETS_DISCOVERED_TOTAL.inc_by(count as u64);
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_admission_decision(operation: &str, allowed: bool) {
    let result = if allowed { "allowed" } else { "denied" };
    ADMISSION_DECISIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(i64::try_from(depth).unwrap_or(i64::MAX));
}
