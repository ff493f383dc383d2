use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use cohort_core::CohortMonth;

use super::cohort::CohortAssignments;
use super::filter::ValidTransaction;

/// A valid transaction placed relative to its customer's cohort start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketedTransaction {
    pub customer_id: String,
    pub cohort_month: CohortMonth,
    pub month_offset: u32,
    pub sale_value: Decimal,
}

/// Why a transaction did not produce a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unbucketed {
    /// Offset exceeds the configured horizon.
    BeyondHorizon,
    /// Customer has no cohort, or the purchase precedes it. Cannot happen
    /// when the assignments were built from the same transactions.
    Unassigned,
}

/// Calendar months between `cohort` and `tx_month`, computed as
/// `(y2 - y1) * 12 + (m2 - m1)`. Day of month is ignored.
pub fn month_offset(cohort: CohortMonth, tx_month: CohortMonth) -> i64 {
    cohort.months_until(tx_month)
}

/// Place one transaction, dropping it when its offset exceeds `max_offset`.
pub fn bucket(
    tx: &ValidTransaction,
    assignments: &CohortAssignments,
    max_offset: u32,
) -> Result<BucketedTransaction, Unbucketed> {
    let cohort_month = assignments
        .get(tx.customer_id())
        .ok_or(Unbucketed::Unassigned)?;
    let offset = month_offset(cohort_month, tx.month());
    let month_offset = u32::try_from(offset).map_err(|_| Unbucketed::Unassigned)?;
    if month_offset > max_offset {
        return Err(Unbucketed::BeyondHorizon);
    }

    Ok(BucketedTransaction {
        customer_id: tx.customer_id().to_owned(),
        cohort_month,
        month_offset,
        sale_value: tx.sale_value(),
    })
}

/// Bucketing outcome for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct BucketOutput {
    pub buckets: Vec<BucketedTransaction>,
    pub beyond_horizon: u64,
    pub unassigned: u64,
}

/// Bucket every transaction in parallel.
pub fn bucket_all(
    transactions: &[ValidTransaction],
    assignments: &CohortAssignments,
    max_offset: u32,
) -> BucketOutput {
    let results: Vec<_> = transactions
        .par_iter()
        .map(|tx| bucket(tx, assignments, max_offset))
        .collect();

    let mut out = BucketOutput {
        buckets: Vec::with_capacity(results.len()),
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(b) => out.buckets.push(b),
            Err(Unbucketed::BeyondHorizon) => out.beyond_horizon += 1,
            Err(Unbucketed::Unassigned) => out.unassigned += 1,
        }
    }

    if out.unassigned > 0 {
        warn!(
            unassigned = out.unassigned,
            "transactions without a usable cohort assignment were skipped"
        );
    }

    out
}
