//! Cumulative sampling statistics.

/// Stat keys used for the per-activity statistics snapshot.
pub const STAT_NOOP_COUNT: &str = "noop.count";
pub const STAT_SAMPLE_COUNT: &str = "sample.count";
pub const STAT_TOTAL_ERROR_COUNT: &str = "total.error.count";
pub const STAT_TOTAL_EXCLUDE_COUNT: &str = "total.exclude.count";
pub const STAT_OBJECT_COUNT: &str = "object.count";
pub const STAT_CONDITION_COUNT: &str = "condition.count";
pub const STAT_LISTENER_COUNT: &str = "listener.count";
pub const STAT_TOTAL_ACTION_COUNT: &str = "total.action.count";
pub const STAT_TOTAL_METRIC_COUNT: &str = "total.metric.count";
pub const STAT_LAST_METRIC_COUNT: &str = "last.metric.count";
pub const STAT_SAMPLE_TIME_USEC: &str = "sample.time.usec";

/// Counters maintained by one sample handler.
///
/// Mutated only by the handler during a cycle; read by listeners and
/// external callers; reset as a unit. `sample_count` and
/// `total_metric_count` are non-decreasing between resets.
#[derive(Debug, Clone, Default)]
pub struct SampleContext {
    pub(crate) sample_count: u64,
    pub(crate) object_count: u64,
    pub(crate) excluded_attr_count: u64,
    pub(crate) total_metric_count: u64,
    pub(crate) last_metric_count: u64,
    pub(crate) total_noop_count: u64,
    pub(crate) total_error_count: u64,
    pub(crate) total_action_count: u64,
    pub(crate) last_sample_usec: i64,
    pub(crate) last_error: Option<String>,
}

impl SampleContext {
    /// Number of completed sampling cycles.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Managed objects known after the last discovery pass.
    pub fn object_count(&self) -> u64 {
        self.object_count
    }

    /// Live size of the exclusion set.
    pub fn excluded_attr_count(&self) -> u64 {
        self.excluded_attr_count
    }

    /// Metrics merged into snapshots across all cycles.
    pub fn total_metric_count(&self) -> u64 {
        self.total_metric_count
    }

    /// Metrics merged during the last cycle.
    pub fn last_metric_count(&self) -> u64 {
        self.last_metric_count
    }

    /// No-op activities plus samples that executed without contributing a
    /// metric.
    pub fn total_noop_count(&self) -> u64 {
        self.total_noop_count
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_error_count
    }

    /// Actions fired by matching conditions.
    pub fn total_action_count(&self) -> u64 {
        self.total_action_count
    }

    /// Duration of the last cycle, microseconds.
    pub fn last_sample_usec(&self) -> i64 {
        self.last_sample_usec
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
