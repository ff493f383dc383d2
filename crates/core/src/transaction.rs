use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer identifier as it appears in the source (normalized text).
pub type CustomerId = String;

/// Invoice prefix marking a cancellation in the retail dump.
pub const DEFAULT_CANCELLATION_PREFIX: &str = "C";

/// Whether `invoice_id` carries the cancellation marker.
///
/// An empty marker disables cancellation detection.
pub fn is_cancellation_invoice(invoice_id: &str, prefix: &str) -> bool {
    !prefix.is_empty() && invoice_id.trim_start().starts_with(prefix)
}

/// A transaction row as delivered by ingestion, timestamp still unparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub customer_id: Option<CustomerId>,
    pub invoice_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub invoice_date: String,
}

/// A parsed transaction. Raw data may violate every business rule here:
/// negative quantities, missing customers, zero prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub customer_id: Option<CustomerId>,
    pub invoice_id: String,
    pub invoice_is_cancellation: bool,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub timestamp: NaiveDateTime,
}

impl TransactionRecord {
    /// Build a record, deriving the cancellation flag from `invoice_id`
    /// with the default marker.
    pub fn new(
        customer_id: Option<&str>,
        invoice_id: &str,
        quantity: i64,
        unit_price: Decimal,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self::with_cancellation_prefix(
            customer_id,
            invoice_id,
            quantity,
            unit_price,
            timestamp,
            DEFAULT_CANCELLATION_PREFIX,
        )
    }

    pub fn with_cancellation_prefix(
        customer_id: Option<&str>,
        invoice_id: &str,
        quantity: i64,
        unit_price: Decimal,
        timestamp: NaiveDateTime,
        cancellation_prefix: &str,
    ) -> Self {
        Self {
            customer_id: customer_id.map(str::to_owned),
            invoice_id: invoice_id.to_owned(),
            invoice_is_cancellation: is_cancellation_invoice(invoice_id, cancellation_prefix),
            quantity,
            unit_price,
            timestamp,
        }
    }

    /// `quantity × unit_price`, or `None` when the product does not fit a
    /// `Decimal`.
    pub fn sale_value(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }
}
