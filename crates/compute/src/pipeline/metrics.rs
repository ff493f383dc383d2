use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::filter::FilterStats;

/// Counters and timings for the most recent pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    /// When the last run completed.
    pub last_run: Option<DateTime<Utc>>,
    /// Wall time of the last run in milliseconds.
    pub duration_ms: u64,

    /// Raw rows handed to `run_raw` (0 for `run`).
    pub rows_in: u64,
    /// Rows rejected by the parser.
    pub rows_rejected: u64,
    /// Parsed records entering the filter.
    pub records: u64,
    /// Filter outcome by exclusion kind.
    pub filter: FilterStats,
    /// Valid transactions past the configured horizon.
    pub beyond_horizon: u64,
    /// Valid transactions with no usable cohort (should stay 0).
    pub unassigned: u64,
    /// Cohort/offset revenue cells whose sum overflowed.
    pub revenue_overflow: u64,

    pub customers: u64,
    pub cohorts: u64,
}

impl PipelineMetrics {
    /// Record completion of a run.
    pub fn record_run(&mut self, elapsed: Duration) {
        self.last_run = Some(Utc::now());
        self.duration_ms = elapsed.as_millis() as u64;
    }

    /// Share of parsed records that passed the filter, in percent.
    pub fn acceptance_rate(&self) -> Option<f64> {
        if self.records == 0 {
            return None;
        }
        Some(100.0 * self.filter.accepted as f64 / self.records as f64)
    }

    /// Create a scoped timer for a run.
    pub fn timer(&self) -> RunTimer {
        RunTimer {
            start: Instant::now(),
        }
    }
}

/// A scoped timer for whole-run measurements.
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Finalize the timer and record metrics.
    pub fn finish(self, metrics: &mut PipelineMetrics) {
        metrics.record_run(self.start.elapsed());
    }
}
