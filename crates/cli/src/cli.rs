use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use cohort_compute::ReportKind;
use cohort_core::Config;

/// Retail cohort reports from a transaction dump.
///
/// Groups customers by the month of their first valid purchase and prints
/// counts, retention, churn, revenue and average spend per month offset.
#[derive(Parser, Debug)]
#[command(name = "cohort-report", version, about = "Retail cohort reports from a transaction dump")]
pub struct CliArgs {
    /// Parquet file, or a directory of Parquet files
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Config profile (overrides COHORT_PROFILE)
    #[arg(long, env = "COHORT_PROFILE")]
    pub profile: Option<String>,

    /// Highest month offset to report
    #[arg(long)]
    pub max_offset: Option<u32>,

    /// chrono format of the invoice date column
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Rayon worker threads (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Which report to print
    #[arg(long, value_enum, default_value = "all")]
    pub report: ReportSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportSelection {
    All,
    Counts,
    Retention,
    Churn,
    Revenue,
    Spend,
}

impl ReportSelection {
    pub fn kinds(&self) -> Vec<ReportKind> {
        match self {
            ReportSelection::All => ReportKind::ALL.to_vec(),
            ReportSelection::Counts => vec![ReportKind::Counts],
            ReportSelection::Retention => vec![ReportKind::Retention],
            ReportSelection::Churn => vec![ReportKind::Churn],
            ReportSelection::Revenue => vec![ReportKind::Revenue],
            ReportSelection::Spend => vec![ReportKind::AverageSpend],
        }
    }
}

impl CliArgs {
    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(max_offset) = self.max_offset {
            config.pipeline.max_offset = max_offset;
        }
        if let Some(ref format) = self.timestamp_format {
            config.pipeline.timestamp_format = format.clone();
        }
        if let Some(threads) = self.threads {
            config.pipeline.worker_threads = threads;
        }
    }

    /// Input path, falling back to the configured data directory.
    pub fn input_path(&self, config: &Config) -> PathBuf {
        self.input
            .clone()
            .unwrap_or_else(|| config.ingest.data_dir.clone())
    }
}
