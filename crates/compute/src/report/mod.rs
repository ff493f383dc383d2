//! Report derivers: counts, retention, churn, revenue and average spend.
//!
//! All derivers are pure functions of the aggregated [`CohortMetricsRow`]s
//! and keep their cohort ordering. Values are exact here; rounding belongs
//! to [`render`].

pub mod render;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use cohort_core::CohortMonth;

use crate::pipeline::aggregate::CohortMetricsRow;

pub use render::{Cell, ReportKind, ReportTable, TableRow};

/// Raw distinct-customer counts for offsets `0..=N`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountsRow {
    pub cohort_month: CohortMonth,
    pub counts: Vec<u64>,
}

/// Percentages for offsets `1..=N` next to the raw cohort size.
///
/// `rates[i]` belongs to offset `i + 1`. `None` when the cohort is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRow {
    pub cohort_month: CohortMonth,
    pub cohort_size: u64,
    pub rates: Vec<Option<f64>>,
}

/// Summed sale value for offsets `0..=N`. `None` marks a sum too large to
/// represent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueRow {
    pub cohort_month: CohortMonth,
    pub revenue: Vec<Option<Decimal>>,
}

/// Revenue per active customer for offsets `0..=N`. `None` means no customer
/// reached that offset, which is not the same as spending nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendRow {
    pub cohort_month: CohortMonth,
    pub average: Vec<Option<Decimal>>,
}

/// The five report tables of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortReport {
    pub max_offset: u32,
    pub counts: Vec<CountsRow>,
    pub retention: Vec<RateRow>,
    pub churn: Vec<RateRow>,
    pub revenue: Vec<RevenueRow>,
    pub average_spend: Vec<SpendRow>,
}

impl CohortReport {
    /// Run every deriver over `rows`.
    pub fn derive(rows: &[CohortMetricsRow], max_offset: u32) -> Self {
        Self {
            max_offset,
            counts: counts(rows),
            retention: retention(rows),
            churn: churn(rows),
            revenue: revenue(rows),
            average_spend: average_spend(rows),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// `100 × count[k] / count[0]`, or `None` when `count[0]` is zero.
pub fn retention_rate(cohort_size: u64, active: u64) -> Option<f64> {
    if cohort_size == 0 {
        return None;
    }
    Some(100.0 * active as f64 / cohort_size as f64)
}

/// `revenue / customers`, or `None` when nobody was active or the revenue
/// is unknown.
pub fn average(revenue: Option<Decimal>, customers: u64) -> Option<Decimal> {
    if customers == 0 {
        return None;
    }
    revenue?.checked_div(Decimal::from(customers))
}

pub fn counts(rows: &[CohortMetricsRow]) -> Vec<CountsRow> {
    rows.par_iter()
        .map(|r| CountsRow {
            cohort_month: r.cohort_month,
            counts: r.customers_by_offset.clone(),
        })
        .collect()
}

pub fn retention(rows: &[CohortMetricsRow]) -> Vec<RateRow> {
    rows.par_iter()
        .map(|r| {
            let size = r.cohort_size();
            RateRow {
                cohort_month: r.cohort_month,
                cohort_size: size,
                rates: (1..=r.max_offset())
                    .map(|k| retention_rate(size, r.customers_at(k)))
                    .collect(),
            }
        })
        .collect()
}

/// `100 − retention` per offset, with the same empty-cohort guard.
pub fn churn(rows: &[CohortMetricsRow]) -> Vec<RateRow> {
    retention(rows)
        .into_par_iter()
        .map(|mut row| {
            for rate in row.rates.iter_mut() {
                *rate = rate.map(|r| 100.0 - r);
            }
            row
        })
        .collect()
}

pub fn revenue(rows: &[CohortMetricsRow]) -> Vec<RevenueRow> {
    rows.par_iter()
        .map(|r| RevenueRow {
            cohort_month: r.cohort_month,
            revenue: r.revenue_by_offset.clone(),
        })
        .collect()
}

pub fn average_spend(rows: &[CohortMetricsRow]) -> Vec<SpendRow> {
    rows.par_iter()
        .map(|r| SpendRow {
            cohort_month: r.cohort_month,
            average: (0..=r.max_offset())
                .map(|k| average(r.revenue_at(k), r.customers_at(k)))
                .collect(),
        })
        .collect()
}
