use chrono::{DateTime, NaiveDateTime};
use rayon::prelude::*;
use tracing::warn;

use cohort_core::{RawTransaction, RejectedRow, RowError, TransactionRecord};

/// Formats tried after the configured one.
const FALLBACK_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse an invoice date with `format`, then the fallback formats, then RFC 3339.
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
        return Some(ts);
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Convert one raw row. `row` is its position in the source.
pub fn parse_row(
    row: usize,
    raw: &RawTransaction,
    timestamp_format: &str,
    cancellation_prefix: &str,
) -> Result<TransactionRecord, RejectedRow> {
    let timestamp = parse_timestamp(&raw.invoice_date, timestamp_format).ok_or_else(|| {
        RejectedRow {
            row,
            invoice_id: Some(raw.invoice_id.clone()),
            reason: RowError::InvalidTimestamp {
                value: raw.invoice_date.clone(),
            },
        }
    })?;

    let customer_id = raw
        .customer_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    Ok(TransactionRecord::with_cancellation_prefix(
        customer_id,
        raw.invoice_id.trim(),
        raw.quantity,
        raw.unit_price,
        timestamp,
        cancellation_prefix,
    ))
}

/// Parse every raw row, splitting successes from row-level rejects.
/// Both outputs keep source order.
pub fn parse_all(
    raws: &[RawTransaction],
    timestamp_format: &str,
    cancellation_prefix: &str,
) -> (Vec<TransactionRecord>, Vec<RejectedRow>) {
    let results: Vec<_> = raws
        .par_iter()
        .enumerate()
        .map(|(i, raw)| parse_row(i, raw, timestamp_format, cancellation_prefix))
        .collect();

    let mut records = Vec::with_capacity(results.len());
    let mut rejected = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(reject) => rejected.push(reject),
        }
    }

    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), total = raws.len(), "rows rejected during parsing");
    }

    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rust_decimal_macros::dec;

    const FMT: &str = "%m/%d/%Y %H:%M";

    fn raw(customer: Option<&str>, invoice: &str, date: &str) -> RawTransaction {
        RawTransaction {
            customer_id: customer.map(str::to_owned),
            invoice_id: invoice.to_owned(),
            quantity: 6,
            unit_price: dec!(2.55),
            invoice_date: date.to_owned(),
        }
    }

    #[test]
    fn parses_retail_dump_format() {
        let ts = parse_timestamp("12/1/2010 8:26", FMT).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2010, 12, 1));
        assert_eq!((ts.hour(), ts.minute()), (8, 26));
    }

    #[test]
    fn falls_back_to_iso_and_rfc3339() {
        assert!(parse_timestamp("2011-01-04 10:00:00", FMT).is_some());
        assert!(parse_timestamp("2011-01-04T10:00:00+00:00", FMT).is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("", FMT).is_none());
        assert!(parse_timestamp("yesterday", FMT).is_none());
        assert!(parse_timestamp("13/45/2010 8:26", FMT).is_none());
    }

    #[test]
    fn blank_customer_becomes_none() {
        let r = parse_row(0, &raw(Some("  "), "536365", "12/1/2010 8:26"), FMT, "C").unwrap();
        assert_eq!(r.customer_id, None);
    }

    #[test]
    fn parse_all_reports_bad_rows_with_index() {
        let raws = vec![
            raw(Some("17850"), "536365", "12/1/2010 8:26"),
            raw(Some("17850"), "536366", "not a date"),
            raw(Some("13047"), "C536379", "12/1/2010 9:41"),
        ];
        let (records, rejected) = parse_all(&raws, FMT, "C");

        assert_eq!(records.len(), 2);
        assert!(records[1].invoice_is_cancellation);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].row, 1);
        assert_eq!(rejected[0].invoice_id.as_deref(), Some("536366"));
        assert!(matches!(rejected[0].reason, RowError::InvalidTimestamp { .. }));
    }
}
