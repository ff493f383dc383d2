use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use cohort_core::config::ColumnMapping;
use cohort_core::{CohortError, RawTransaction, RejectedRow, RowError};

/// Rows read from one or more dumps, plus the rows that could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutput {
    pub rows: Vec<RawTransaction>,
    pub rejected: Vec<RejectedRow>,
}

impl ImportOutput {
    fn extend(&mut self, other: ImportOutput) {
        self.rows.extend(other.rows);
        self.rejected.extend(other.rejected);
    }
}

pub struct ParquetImporter;

impl ParquetImporter {
    /// Read a transaction dump. Any column type is accepted; values are cast
    /// to text before parsing.
    pub fn import(path: &Path, columns: &ColumnMapping) -> Result<ImportOutput, CohortError> {
        Self::import_from(path, columns, 0)
    }

    /// Import every `*.parquet` file in `dir`, in file-name order. Row
    /// numbers continue across files.
    pub fn import_dir(dir: &Path, columns: &ColumnMapping) -> Result<ImportOutput, CohortError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();

        let mut output = ImportOutput::default();
        for file in &files {
            let next_row = output.rows.len() + output.rejected.len();
            output.extend(Self::import_from(file, columns, next_row)?);
        }

        info!(
            files = files.len(),
            rows = output.rows.len(),
            rejected = output.rejected.len(),
            "Imported transaction dumps from {}",
            dir.display()
        );
        Ok(output)
    }

    fn import_from(
        path: &Path,
        columns: &ColumnMapping,
        first_row: usize,
    ) -> Result<ImportOutput, CohortError> {
        let file = std::fs::File::open(path).map_err(CohortError::Io)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| CohortError::Parquet(e.to_string()))?;

        let reader = builder.build().map_err(|e| CohortError::Parquet(e.to_string()))?;

        let mut output = ImportOutput::default();
        let mut row = first_row;

        for batch_result in reader {
            let batch = batch_result.map_err(|e| CohortError::Parquet(e.to_string()))?;
            let cols = BatchColumns::resolve(&batch, columns)?;

            for row_idx in 0..batch.num_rows() {
                match cols.read_row(row_idx) {
                    Ok(raw) => output.rows.push(raw),
                    Err(reason) => {
                        debug!(row, %reason, "row rejected on import");
                        output.rejected.push(RejectedRow {
                            row,
                            invoice_id: cols.text(&cols.invoice_id, row_idx).map(str::to_owned),
                            reason,
                        });
                    }
                }
                row += 1;
            }
        }

        if !output.rejected.is_empty() {
            warn!(
                rejected = output.rejected.len(),
                "rows rejected while importing {}",
                path.display()
            );
        }
        info!("Imported {} transactions from {}", output.rows.len(), path.display());
        Ok(output)
    }
}

/// The mapped columns of one record batch, cast to text.
struct BatchColumns {
    invoice_id: ArrayRef,
    quantity: ArrayRef,
    invoice_date: ArrayRef,
    unit_price: ArrayRef,
    customer_id: ArrayRef,
}

impl BatchColumns {
    fn resolve(batch: &RecordBatch, columns: &ColumnMapping) -> Result<Self, CohortError> {
        let text_column = |name: &str| -> Result<ArrayRef, CohortError> {
            let idx = batch
                .schema()
                .index_of(name)
                .map_err(|_| CohortError::ColumnNotFound(name.to_string()))?;
            cast(batch.column(idx), &DataType::Utf8).map_err(|e| CohortError::Parquet(e.to_string()))
        };

        Ok(Self {
            invoice_id: text_column(&columns.invoice_id)?,
            quantity: text_column(&columns.quantity)?,
            invoice_date: text_column(&columns.invoice_date)?,
            unit_price: text_column(&columns.unit_price)?,
            customer_id: text_column(&columns.customer_id)?,
        })
    }

    /// Non-blank text at `row_idx`, or `None` for null/blank cells.
    fn text<'a>(&self, column: &'a ArrayRef, row_idx: usize) -> Option<&'a str> {
        let arr = column.as_any().downcast_ref::<StringArray>()?;
        if arr.is_null(row_idx) {
            return None;
        }
        let val = arr.value(row_idx).trim();
        if is_blank(val) {
            None
        } else {
            Some(val)
        }
    }

    fn required<'a>(&self, column: &'a ArrayRef, row_idx: usize, field: &str) -> Result<&'a str, RowError> {
        self.text(column, row_idx).ok_or_else(|| RowError::MissingField {
            field: field.to_string(),
        })
    }

    fn read_row(&self, row_idx: usize) -> Result<RawTransaction, RowError> {
        let invoice_id = self.required(&self.invoice_id, row_idx, "invoice_id")?;
        let quantity_text = self.required(&self.quantity, row_idx, "quantity")?;
        let quantity = parse_quantity(quantity_text).ok_or_else(|| RowError::InvalidQuantity {
            value: quantity_text.to_string(),
        })?;
        let price_text = self.required(&self.unit_price, row_idx, "unit_price")?;
        let unit_price = parse_price(price_text).ok_or_else(|| RowError::InvalidUnitPrice {
            value: price_text.to_string(),
        })?;
        let invoice_date = self.required(&self.invoice_date, row_idx, "invoice_date")?;

        Ok(RawTransaction {
            customer_id: self
                .text(&self.customer_id, row_idx)
                .and_then(normalize_customer_id),
            invoice_id: invoice_id.to_string(),
            quantity,
            unit_price,
            invoice_date: invoice_date.to_string(),
        })
    }
}

fn is_blank(val: &str) -> bool {
    val.is_empty()
        || val.eq_ignore_ascii_case("none")
        || val.eq_ignore_ascii_case("null")
        || val.eq_ignore_ascii_case("nan")
        || val == "undefined"
}

/// Customer ids often arrive as floats (`17850.0`); strip the zero fraction.
pub fn normalize_customer_id(val: &str) -> Option<String> {
    let val = val.trim();
    if is_blank(val) {
        return None;
    }
    if let Some((int, frac)) = val.split_once('.') {
        if !int.is_empty()
            && int.chars().all(|c| c.is_ascii_digit())
            && frac.chars().all(|c| c == '0')
        {
            return Some(int.to_string());
        }
    }
    Some(val.to_string())
}

/// Integer quantity; whole-valued floats such as `6.0` are accepted.
pub fn parse_quantity(val: &str) -> Option<i64> {
    if let Ok(q) = val.parse::<i64>() {
        return Some(q);
    }
    let d = Decimal::from_str(val).ok()?;
    if d.fract().is_zero() {
        d.to_i64()
    } else {
        None
    }
}

pub fn parse_price(val: &str) -> Option<Decimal> {
    Decimal::from_str(val)
        .or_else(|_| Decimal::from_scientific(val))
        .ok()
}
