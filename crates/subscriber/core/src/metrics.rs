//! Metrics for log subscriptions.

/// Container for the subscriber's metric names.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Gauge of live log subscriptions.
    pub const ACTIVE_SUBSCRIPTIONS: &'static str = "herald_active_log_subscriptions";
    /// Counter of logs delivered by backfill queries.
    pub const LOGS_BACKFILLED_TOTAL: &'static str = "herald_logs_backfilled_total";
    /// Counter of logs delivered from live streams.
    pub const LOGS_DELIVERED_TOTAL: &'static str = "herald_logs_delivered_total";
    /// Counter of live logs suppressed because their block was covered by the backfill.
    pub const LOGS_SUPPRESSED_TOTAL: &'static str = "herald_logs_suppressed_total";
    /// Counter of errors reported by transports.
    pub const TRANSPORT_ERRORS_TOTAL: &'static str = "herald_transport_errors_total";
    /// Counter of logs dropped by the dispatcher, labelled by reason.
    pub const LOGS_DROPPED_TOTAL: &'static str = "herald_logs_dropped_total";
    /// Counter of runs begun on the run engine.
    pub const RUNS_STARTED_TOTAL: &'static str = "herald_runs_started_total";
    /// Counter of run engine failures.
    pub const RUN_ERRORS_TOTAL: &'static str = "herald_run_errors_total";

    /// Drop reason: the log is not a `RunRequest` for the job.
    pub const DROP_INVALID: &'static str = "invalid";
    /// Drop reason: the log could not be decoded.
    pub const DROP_DECODE: &'static str = "decode";

    /// Describes and zeroes every metric.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_gauge!(
            Self::ACTIVE_SUBSCRIPTIONS,
            metrics::Unit::Count,
            "Number of live log subscriptions",
        );
        metrics::describe_counter!(
            Self::LOGS_BACKFILLED_TOTAL,
            metrics::Unit::Count,
            "Total number of logs delivered by backfill queries",
        );
        metrics::describe_counter!(
            Self::LOGS_DELIVERED_TOTAL,
            metrics::Unit::Count,
            "Total number of logs delivered from live streams",
        );
        metrics::describe_counter!(
            Self::LOGS_SUPPRESSED_TOTAL,
            metrics::Unit::Count,
            "Total number of live logs suppressed as already backfilled",
        );
        metrics::describe_counter!(
            Self::TRANSPORT_ERRORS_TOTAL,
            metrics::Unit::Count,
            "Total number of errors reported by log transports",
        );
        metrics::describe_counter!(
            Self::LOGS_DROPPED_TOTAL,
            metrics::Unit::Count,
            "Total number of logs dropped before reaching the run engine",
        );
        metrics::describe_counter!(
            Self::RUNS_STARTED_TOTAL,
            metrics::Unit::Count,
            "Total number of runs begun from logs",
        );
        metrics::describe_counter!(
            Self::RUN_ERRORS_TOTAL,
            metrics::Unit::Count,
            "Total number of failed attempts to begin a run",
        );
    }

    fn zero() {
        metrics::gauge!(Self::ACTIVE_SUBSCRIPTIONS).set(0.0);
        metrics::counter!(Self::LOGS_BACKFILLED_TOTAL).increment(0);
        metrics::counter!(Self::LOGS_DELIVERED_TOTAL).increment(0);
        metrics::counter!(Self::LOGS_SUPPRESSED_TOTAL).increment(0);
        metrics::counter!(Self::TRANSPORT_ERRORS_TOTAL).increment(0);
        metrics::counter!(Self::LOGS_DROPPED_TOTAL, "reason" => Self::DROP_INVALID).increment(0);
        metrics::counter!(Self::LOGS_DROPPED_TOTAL, "reason" => Self::DROP_DECODE).increment(0);
        metrics::counter!(Self::RUNS_STARTED_TOTAL).increment(0);
        metrics::counter!(Self::RUN_ERRORS_TOTAL).increment(0);
    }
}
