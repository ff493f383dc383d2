use serde::Serialize;
use thiserror::Error;

pub type CohortResult<T> = Result<T, CohortError>;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("{0}")]
    Other(String),
}

/// Row-level failure. Never aborts a run; carried alongside the report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("unparseable timestamp {value:?}")]
    InvalidTimestamp { value: String },

    #[error("unparseable quantity {value:?}")]
    InvalidQuantity { value: String },

    #[error("unparseable unit price {value:?}")]
    InvalidUnitPrice { value: String },

    #[error("missing {field}")]
    MissingField { field: String },
}

/// A source row that could not be turned into a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Zero-based position of the row in its source.
    pub row: usize,
    pub invoice_id: Option<String>,
    pub reason: RowError,
}

impl std::fmt::Display for RejectedRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.invoice_id {
            Some(invoice) => write!(f, "row {} (invoice {}): {}", self.row, invoice, self.reason),
            None => write!(f, "row {}: {}", self.row, self.reason),
        }
    }
}
