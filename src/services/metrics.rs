//! Prometheus metrics for the credit engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};

/// Credit limit guard outcomes.
pub static CREDIT_CHECKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_checks_total",
        "Credit limit guard outcomes",
        &["outcome"] // accepted, rejected_unverified, rejected_insufficient
    )
    .expect("Failed to register credit_checks_total")
});

/// Order lifecycle transitions by kind and result.
pub static ORDER_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_order_transitions_total",
        "Order lifecycle transitions",
        &["transition", "status"] // approve/dispatch/deliver/cancel/complete, ok/error
    )
    .expect("Failed to register order_transitions_total")
});

/// EMI payments by timeliness (no per-account labels to avoid cardinality
/// explosion).
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "credit_payments_total",
        "EMI payments recorded",
        &["timeliness"] // on_time, late
    )
    .expect("Failed to register payments_total")
});

/// Installments created through order approvals.
pub static INSTALLMENTS_CREATED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "credit_installments_created_total",
        "Total number of installments scheduled"
    )
    .expect("Failed to register installments_created")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "credit_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&CREDIT_CHECKS_TOTAL);
    Lazy::force(&ORDER_TRANSITIONS_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&INSTALLMENTS_CREATED);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
