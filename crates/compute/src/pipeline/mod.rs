//! Cohort pipeline orchestrator.
//!
//! Wires the stages together in a single forward pass:
//!
//! - **Parse**: raw rows → records, bad timestamps become [`RejectedRow`]s.
//! - **Filter**: drop rows failing the business-validity rules.
//! - **Assign**: full grouping pass, customer → cohort month.
//! - **Bucket**: month offset per transaction, clamped to the horizon.
//! - **Aggregate**: per-cohort distinct customers and revenue by offset.
//! - **Derive**: the five report tables.

pub mod aggregate;
pub mod bucket;
pub mod cohort;
pub mod filter;
pub mod metrics;
pub mod parse;

use rayon::ThreadPool;
use serde::Serialize;
use tracing::{debug, info, warn};

use cohort_core::config::PipelineConfig;
use cohort_core::{CohortError, CohortResult, RawTransaction, RejectedRow, TransactionRecord};

use crate::report::CohortReport;

use self::aggregate::aggregate;
use self::bucket::bucket_all;
use self::cohort::assign_cohorts;
use self::filter::filter_with_stats;
use self::metrics::PipelineMetrics;

/// Report plus the rows that could not be placed in any cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub report: CohortReport,
    pub rejected: Vec<RejectedRow>,
}

/// Batch cohort pipeline. Each run is a pure function of its input; only
/// [`PipelineMetrics`] carry over between runs.
pub struct CohortPipeline {
    config: PipelineConfig,
    pool: Option<ThreadPool>,
    metrics: PipelineMetrics,
}

impl CohortPipeline {
    /// Create a pipeline. A dedicated thread pool is built when
    /// `worker_threads > 0`, otherwise the global rayon pool is used.
    pub fn new(config: PipelineConfig) -> CohortResult<Self> {
        config.validate()?;
        let pool = if config.worker_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("cohort-worker-{}", i))
                .build()
                .map_err(|e| CohortError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            config,
            pool,
            metrics: PipelineMetrics::default(),
        })
    }

    /// Metrics of the most recent run.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Run the pipeline over already-parsed records.
    pub fn run(&mut self, records: &[TransactionRecord]) -> CohortReport {
        let mut metrics = PipelineMetrics::default();
        let timer = metrics.timer();

        let report = self.install(|config| compute(records, config, &mut metrics));

        timer.finish(&mut metrics);
        self.finish(metrics);
        report
    }

    /// Parse raw rows first, then run. Unparseable rows are returned next to
    /// the report instead of failing the run.
    pub fn run_raw(&mut self, raws: &[RawTransaction]) -> PipelineOutput {
        let mut metrics = PipelineMetrics::default();
        let timer = metrics.timer();

        let output = self.install(|config| {
            let (records, rejected) = parse::parse_all(
                raws,
                &config.timestamp_format,
                &config.cancellation_prefix,
            );
            metrics.rows_in = raws.len() as u64;
            metrics.rows_rejected = rejected.len() as u64;

            let report = compute(&records, config, &mut metrics);
            PipelineOutput { report, rejected }
        });

        timer.finish(&mut metrics);
        self.finish(metrics);
        output
    }

    fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce(&PipelineConfig) -> R + Send,
    {
        let config = &self.config;
        match &self.pool {
            Some(pool) => pool.install(|| f(config)),
            None => f(config),
        }
    }

    fn finish(&mut self, metrics: PipelineMetrics) {
        info!(
            records = metrics.records,
            rejected = metrics.rows_rejected,
            valid = metrics.filter.accepted,
            excluded = metrics.filter.excluded(),
            beyond_horizon = metrics.beyond_horizon,
            customers = metrics.customers,
            cohorts = metrics.cohorts,
            elapsed_ms = metrics.duration_ms,
            "cohort pipeline completed"
        );
        self.metrics = metrics;
    }
}

impl Default for CohortPipeline {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            pool: None,
            metrics: PipelineMetrics::default(),
        }
    }
}

/// Filter → assign → bucket → aggregate → derive.
fn compute(
    records: &[TransactionRecord],
    config: &PipelineConfig,
    metrics: &mut PipelineMetrics,
) -> CohortReport {
    metrics.records = records.len() as u64;

    let (valid, filter_stats) = filter_with_stats(records);
    debug!(
        accepted = filter_stats.accepted,
        missing_customer = filter_stats.missing_customer,
        cancellation = filter_stats.cancellation,
        non_positive_quantity = filter_stats.non_positive_quantity,
        non_positive_price = filter_stats.non_positive_price,
        value_overflow = filter_stats.value_overflow,
        "filter completed"
    );
    metrics.filter = filter_stats;

    // Every customer's history must be grouped before any offset exists.
    let assignments = assign_cohorts(&valid);
    metrics.customers = assignments.len() as u64;
    let sizes = assignments.cohort_sizes();
    debug!(
        customers = assignments.len(),
        cohorts = sizes.len(),
        largest_cohort = sizes.iter().map(|(_, n)| *n).max().unwrap_or(0),
        "cohort assignment completed"
    );

    let bucketed = bucket_all(&valid, &assignments, config.max_offset);
    metrics.beyond_horizon = bucketed.beyond_horizon;
    metrics.unassigned = bucketed.unassigned;
    debug!(
        buckets = bucketed.buckets.len(),
        beyond_horizon = bucketed.beyond_horizon,
        max_offset = config.max_offset,
        "bucketing completed"
    );

    let rows = aggregate(&bucketed.buckets, config.max_offset);
    metrics.cohorts = rows.len() as u64;
    metrics.revenue_overflow = rows.iter().map(|r| r.overflowed_offsets() as u64).sum();
    if metrics.revenue_overflow > 0 {
        warn!(
            cells = metrics.revenue_overflow,
            "revenue sums overflowed, reported as missing"
        );
    }

    CohortReport::derive(&rows, config.max_offset)
}
