use std::collections::HashMap;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::debug;

use cohort_core::CohortMonth;

use super::filter::ValidTransaction;

/// Customer → cohort month, built from each customer's full history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortAssignments {
    by_customer: HashMap<String, CohortMonth>,
}

impl CohortAssignments {
    pub fn get(&self, customer_id: &str) -> Option<CohortMonth> {
        self.by_customer.get(customer_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_customer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_customer.is_empty()
    }

    /// Number of customers per cohort month, ascending by month.
    pub fn cohort_sizes(&self) -> Vec<(CohortMonth, usize)> {
        let mut sizes: HashMap<CohortMonth, usize> = HashMap::new();
        for month in self.by_customer.values() {
            *sizes.entry(*month).or_default() += 1;
        }
        let mut sizes: Vec<_> = sizes.into_iter().collect();
        sizes.sort_unstable_by_key(|(month, _)| *month);
        sizes
    }
}

/// Group transactions by customer and take each customer's earliest
/// timestamp, normalized to its calendar month.
///
/// Needs every transaction of a customer before it can answer, so this is a
/// full grouping pass rather than a streaming map. The per-customer minimum
/// is associative, which lets the fold run in parallel.
pub fn assign_cohorts(transactions: &[ValidTransaction]) -> CohortAssignments {
    let first_seen: HashMap<&str, NaiveDateTime> = transactions
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<&str, NaiveDateTime>, tx| {
            acc.entry(tx.customer_id())
                .and_modify(|ts| {
                    if tx.timestamp() < *ts {
                        *ts = tx.timestamp();
                    }
                })
                .or_insert_with(|| tx.timestamp());
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (customer, ts) in b {
                a.entry(customer)
                    .and_modify(|cur| {
                        if ts < *cur {
                            *cur = ts;
                        }
                    })
                    .or_insert(ts);
            }
            a
        });

    let by_customer: HashMap<String, CohortMonth> = first_seen
        .into_iter()
        .map(|(customer, ts)| (customer.to_owned(), CohortMonth::of(ts)))
        .collect();

    debug!(
        customers = by_customer.len(),
        transactions = transactions.len(),
        "cohort assignment completed"
    );

    CohortAssignments { by_customer }
}
