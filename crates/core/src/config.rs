use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CohortError, CohortResult};
use crate::transaction::DEFAULT_CANCELLATION_PREFIX;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub pipeline: PipelineConfig,
    pub report: ReportConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `COHORT_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("COHORT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            pipeline: PipelineConfig::from_env_profiled(p),
            report: ReportConfig::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Log the effective configuration at startup.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  pipeline:  max_offset={}, cancellation_prefix={:?}, timestamp_format={:?}, worker_threads={}",
            self.pipeline.max_offset,
            self.pipeline.cancellation_prefix,
            self.pipeline.timestamp_format,
            self.pipeline.worker_threads
        );
        tracing::info!(
            "  report:    percent_dp={}, revenue_dp={}, spend_dp={}",
            self.report.percent_decimals,
            self.report.revenue_decimals,
            self.report.spend_decimals
        );
        tracing::info!("  ingest:    data_dir={}", self.ingest.data_dir.display());
    }
}

// ── Pipeline ──────────────────────────────────────────────────

/// Largest accepted `max_offset` (100 years of months).
pub const MAX_OFFSET_LIMIT: u32 = 1200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Highest month offset reported. Later transactions are dropped from
    /// per-offset tables.
    pub max_offset: u32,
    /// Invoice prefix marking a cancellation.
    pub cancellation_prefix: String,
    /// `chrono` format of the raw invoice date.
    pub timestamp_format: String,
    /// Rayon worker threads. 0 = rayon default.
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_offset: 12,
            cancellation_prefix: DEFAULT_CANCELLATION_PREFIX.to_string(),
            timestamp_format: "%m/%d/%Y %H:%M".to_string(),
            worker_threads: 0,
        }
    }
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_offset: profiled_env_u32(p, "COHORT_MAX_OFFSET", d.max_offset),
            cancellation_prefix: profiled_env_or(
                p,
                "COHORT_CANCELLATION_PREFIX",
                &d.cancellation_prefix,
            ),
            timestamp_format: profiled_env_or(p, "COHORT_TIMESTAMP_FORMAT", &d.timestamp_format),
            worker_threads: profiled_env_usize(p, "COHORT_WORKER_THREADS", d.worker_threads),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> CohortResult<()> {
        if self.max_offset > MAX_OFFSET_LIMIT {
            return Err(CohortError::Config(format!(
                "max_offset {} exceeds limit {}",
                self.max_offset, MAX_OFFSET_LIMIT
            )));
        }
        Ok(())
    }
}

// ── Report presentation ───────────────────────────────────────

/// Decimal places applied when rendering. Derived values stay unrounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub percent_decimals: u32,
    pub revenue_decimals: u32,
    pub spend_decimals: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            percent_decimals: 2,
            revenue_decimals: 0,
            spend_decimals: 0,
        }
    }
}

impl ReportConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            percent_decimals: profiled_env_u32(p, "COHORT_PERCENT_DECIMALS", d.percent_decimals),
            revenue_decimals: profiled_env_u32(p, "COHORT_REVENUE_DECIMALS", d.revenue_decimals),
            spend_decimals: profiled_env_u32(p, "COHORT_SPEND_DECIMALS", d.spend_decimals),
        }
    }
}

// ── Ingest ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub columns: ColumnMapping,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            columns: ColumnMapping::default(),
        }
    }
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = ColumnMapping::default();
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "COHORT_DATA_DIR", "data")),
            columns: ColumnMapping {
                invoice_id: profiled_env_or(p, "COHORT_COL_INVOICE", &d.invoice_id),
                quantity: profiled_env_or(p, "COHORT_COL_QUANTITY", &d.quantity),
                invoice_date: profiled_env_or(p, "COHORT_COL_DATE", &d.invoice_date),
                unit_price: profiled_env_or(p, "COHORT_COL_PRICE", &d.unit_price),
                customer_id: profiled_env_or(p, "COHORT_COL_CUSTOMER", &d.customer_id),
            },
        }
    }
}

/// Source column names for each transaction field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub invoice_id: String,
    pub quantity: String,
    pub invoice_date: String,
    pub unit_price: String,
    pub customer_id: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            invoice_id: "InvoiceNo".to_string(),
            quantity: "Quantity".to_string(),
            invoice_date: "InvoiceDate".to_string(),
            unit_price: "UnitPrice".to_string(),
            customer_id: "CustomerID".to_string(),
        }
    }
}
