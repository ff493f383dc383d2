//! Business-validity filter over parsed transactions.
//!
//! Rows that fail a rule are dropped without error; bad source data is
//! expected. [`FilterStats`] records why rows were dropped.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use cohort_core::{CohortMonth, TransactionRecord};

/// Why a record was excluded. Rules are checked in declaration order and the
/// first failing rule is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    MissingCustomer,
    Cancellation,
    NonPositiveQuantity,
    NonPositivePrice,
    /// `quantity × unit_price` does not fit a `Decimal`.
    ValueOverflow,
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::MissingCustomer => write!(f, "MissingCustomer"),
            Exclusion::Cancellation => write!(f, "Cancellation"),
            Exclusion::NonPositiveQuantity => write!(f, "NonPositiveQuantity"),
            Exclusion::NonPositivePrice => write!(f, "NonPositivePrice"),
            Exclusion::ValueOverflow => write!(f, "ValueOverflow"),
        }
    }
}

/// A transaction that passed every rule. Only [`validate`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTransaction {
    customer_id: String,
    sale_value: Decimal,
    timestamp: NaiveDateTime,
}

impl ValidTransaction {
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn month(&self) -> CohortMonth {
        CohortMonth::of(self.timestamp)
    }

    pub fn sale_value(&self) -> Decimal {
        self.sale_value
    }
}

/// Check a record against the validity rules.
pub fn validate(record: &TransactionRecord) -> Result<ValidTransaction, Exclusion> {
    let customer_id = match record.customer_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => return Err(Exclusion::MissingCustomer),
    };
    if record.invoice_is_cancellation {
        return Err(Exclusion::Cancellation);
    }
    if record.quantity <= 0 {
        return Err(Exclusion::NonPositiveQuantity);
    }
    if record.unit_price <= Decimal::ZERO {
        return Err(Exclusion::NonPositivePrice);
    }
    let sale_value = record.sale_value().ok_or(Exclusion::ValueOverflow)?;

    Ok(ValidTransaction {
        customer_id: customer_id.to_owned(),
        sale_value,
        timestamp: record.timestamp,
    })
}

/// Lazily yield the valid transactions in `records`.
pub fn valid_transactions(
    records: &[TransactionRecord],
) -> impl Iterator<Item = ValidTransaction> + '_ {
    records.iter().filter_map(|r| validate(r).ok())
}

/// Exclusion counters for one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub accepted: u64,
    pub missing_customer: u64,
    pub cancellation: u64,
    pub non_positive_quantity: u64,
    pub non_positive_price: u64,
    pub value_overflow: u64,
}

impl FilterStats {
    pub fn record(&mut self, exclusion: Exclusion) {
        match exclusion {
            Exclusion::MissingCustomer => self.missing_customer += 1,
            Exclusion::Cancellation => self.cancellation += 1,
            Exclusion::NonPositiveQuantity => self.non_positive_quantity += 1,
            Exclusion::NonPositivePrice => self.non_positive_price += 1,
            Exclusion::ValueOverflow => self.value_overflow += 1,
        }
    }

    pub fn excluded(&self) -> u64 {
        self.missing_customer
            + self.cancellation
            + self.non_positive_quantity
            + self.non_positive_price
            + self.value_overflow
    }

    fn merge(mut self, other: FilterStats) -> Self {
        self.accepted += other.accepted;
        self.missing_customer += other.missing_customer;
        self.cancellation += other.cancellation;
        self.non_positive_quantity += other.non_positive_quantity;
        self.non_positive_price += other.non_positive_price;
        self.value_overflow += other.value_overflow;
        self
    }
}

/// Filter `records` in parallel, counting exclusions by kind.
pub fn filter_with_stats(records: &[TransactionRecord]) -> (Vec<ValidTransaction>, FilterStats) {
    use rayon::prelude::*;

    records
        .par_iter()
        .fold(
            || (Vec::new(), FilterStats::default()),
            |(mut valid, mut stats), record| {
                match validate(record) {
                    Ok(tx) => {
                        stats.accepted += 1;
                        valid.push(tx);
                    }
                    Err(exclusion) => stats.record(exclusion),
                }
                (valid, stats)
            },
        )
        .reduce(
            || (Vec::new(), FilterStats::default()),
            |(mut a, sa), (b, sb)| {
                a.extend(b);
                (a, sa.merge(sb))
            },
        )
}
