//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `datadog_agent_controller_reconciliations_total` - Total number of passes
//! - `datadog_agent_controller_reconciliation_errors_total` - Passes that failed, by reason
//! - `datadog_agent_controller_reconciliation_duration_seconds` - Duration of a pass
//! - `datadog_agent_controller_component_failures_total` - Component passes aborted, by component and reason
//! - `datadog_agent_controller_object_writes_total` - Create/update calls, by kind and operation
//! - `datadog_agent_controller_status_patches_total` - Status subresource patches

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datadog_agent_controller_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datadog_agent_controller_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "datadog_agent_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static COMPONENT_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datadog_agent_controller_component_failures_total",
            "Total number of aborted component passes by component and reason",
        ),
        &["component", "reason"],
    )
    .expect("Failed to create COMPONENT_FAILURES_TOTAL metric - this should never happen")
});

static OBJECT_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datadog_agent_controller_object_writes_total",
            "Total number of object writes by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create OBJECT_WRITES_TOTAL metric - this should never happen")
});

static STATUS_PATCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datadog_agent_controller_status_patches_total",
        "Total number of DatadogAgent status patches",
    )
    .expect("Failed to create STATUS_PATCHES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(COMPONENT_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBJECT_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_PATCHES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_component_failures(component: &str, reason: &str) {
    COMPONENT_FAILURES_TOTAL
        .with_label_values(&[component, reason])
        .inc();
}

pub fn increment_object_writes(kind: &str, operation: &str) {
    OBJECT_WRITES_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn increment_status_patches() {
    STATUS_PATCHES_TOTAL.inc();
}
