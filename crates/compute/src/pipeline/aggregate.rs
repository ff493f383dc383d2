use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use cohort_core::CohortMonth;

use super::bucket::BucketedTransaction;

/// Per-offset aggregates for one cohort.
///
/// Both vectors have `max_offset + 1` entries; offsets with no activity hold
/// zero. `customers_by_offset[0]` is the cohort size. A revenue entry is
/// `None` when its sum does not fit a `Decimal`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortMetricsRow {
    pub cohort_month: CohortMonth,
    pub customers_by_offset: Vec<u64>,
    pub revenue_by_offset: Vec<Option<Decimal>>,
}

impl CohortMetricsRow {
    fn empty(cohort_month: CohortMonth, max_offset: u32) -> Self {
        let width = max_offset as usize + 1;
        Self {
            cohort_month,
            customers_by_offset: vec![0; width],
            revenue_by_offset: vec![Some(Decimal::ZERO); width],
        }
    }

    pub fn cohort_size(&self) -> u64 {
        self.customers_by_offset.first().copied().unwrap_or(0)
    }

    pub fn customers_at(&self, offset: usize) -> u64 {
        self.customers_by_offset.get(offset).copied().unwrap_or(0)
    }

    /// Summed revenue at `offset`; zero past the horizon, `None` on overflow.
    pub fn revenue_at(&self, offset: usize) -> Option<Decimal> {
        match self.revenue_by_offset.get(offset) {
            Some(revenue) => *revenue,
            None => Some(Decimal::ZERO),
        }
    }

    /// Offsets whose revenue sum overflowed.
    pub fn overflowed_offsets(&self) -> usize {
        self.revenue_by_offset.iter().filter(|r| r.is_none()).count()
    }

    pub fn max_offset(&self) -> usize {
        self.customers_by_offset.len().saturating_sub(1)
    }
}

/// Fold one cohort's buckets: distinct customers and summed sale value per
/// offset.
fn fold_cohort(
    cohort_month: CohortMonth,
    buckets: &[&BucketedTransaction],
    max_offset: u32,
) -> CohortMetricsRow {
    let mut row = CohortMetricsRow::empty(cohort_month, max_offset);
    let mut seen: Vec<HashSet<&str>> = vec![HashSet::new(); row.customers_by_offset.len()];

    for b in buckets {
        let k = b.month_offset as usize;
        if k >= seen.len() {
            continue;
        }
        seen[k].insert(b.customer_id.as_str());
        let sum = &mut row.revenue_by_offset[k];
        *sum = sum.and_then(|total| total.checked_add(b.sale_value));
    }

    for (count, customers) in row.customers_by_offset.iter_mut().zip(&seen) {
        *count = customers.len() as u64;
    }
    row
}

/// Group buckets by cohort month and fold each cohort independently.
/// Rows come back ordered by cohort month, ascending.
pub fn aggregate(buckets: &[BucketedTransaction], max_offset: u32) -> Vec<CohortMetricsRow> {
    let mut by_cohort: BTreeMap<CohortMonth, Vec<&BucketedTransaction>> = BTreeMap::new();
    for b in buckets {
        by_cohort.entry(b.cohort_month).or_default().push(b);
    }

    let groups: Vec<_> = by_cohort.into_iter().collect();
    groups
        .par_iter()
        .map(|(month, members)| fold_cohort(*month, members, max_offset))
        .collect()
}
