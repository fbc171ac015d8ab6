//! Export metrics.
//!
//! Recorded through the `metrics` facade; the binary decides whether an
//! exporter is installed.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Exports by strategy and outcome.
    pub const EXPORTS_TOTAL: &str = "clipgrade_exports_total";

    /// Export wall time in seconds by strategy.
    pub const EXPORT_DURATION_SECONDS: &str = "clipgrade_export_duration_seconds";

    /// Post-export quality warnings by kind.
    pub const QUALITY_WARNINGS_TOTAL: &str = "clipgrade_quality_warnings_total";

    /// Batches by outcome.
    pub const BATCHES_TOTAL: &str = "clipgrade_batches_total";
}

/// Record a finished export.
pub fn record_export(strategy: &str, outcome: &str, duration_secs: f64) {
    counter!(
        names::EXPORTS_TOTAL,
        "strategy" => strategy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::EXPORT_DURATION_SECONDS,
        "strategy" => strategy.to_string()
    )
    .record(duration_secs);
}

/// Record a quality warning.
pub fn record_quality_warning(kind: &str) {
    counter!(
        names::QUALITY_WARNINGS_TOTAL,
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a finished batch.
pub fn record_batch(outcome: &str) {
    counter!(
        names::BATCHES_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
