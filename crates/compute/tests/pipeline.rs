//! End-to-end checks of the cohort pipeline against hand-computed reports.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use cohort_compute::pipeline::bucket::bucket_all;
use cohort_compute::pipeline::cohort::assign_cohorts;
use cohort_compute::pipeline::filter::filter_with_stats;
use cohort_compute::{Cell, CohortPipeline, ReportKind};
use cohort_core::config::{PipelineConfig, ReportConfig};
use cohort_core::{CohortMonth, RawTransaction, RowError, TransactionRecord};

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(11, 15, 0)
        .unwrap()
}

fn tx(customer: Option<&str>, invoice: &str, qty: i64, price: Decimal, ts: NaiveDateTime) -> TransactionRecord {
    TransactionRecord::new(customer, invoice, qty, price, ts)
}

fn month(y: i32, m: u32) -> CohortMonth {
    CohortMonth::from_ym(y, m).unwrap()
}

/// A: Jan (2 × $10) and Feb (1 × $5). B: Jan only (1 × $20).
fn two_customer_scenario() -> Vec<TransactionRecord> {
    vec![
        tx(Some("A"), "1001", 2, dec!(10), at(2011, 1, 14)),
        tx(Some("A"), "1002", 1, dec!(5), at(2011, 2, 3)),
        tx(Some("B"), "1003", 1, dec!(20), at(2011, 1, 28)),
    ]
}

#[test]
fn two_customer_scenario_matches_hand_computed_tables() {
    let mut pipeline = CohortPipeline::default();
    let report = pipeline.run(&two_customer_scenario());
    let jan = month(2011, 1);

    assert_eq!(report.counts.len(), 1);
    let counts = &report.counts[0];
    assert_eq!(counts.cohort_month, jan);
    assert_eq!(counts.counts[0], 2);
    assert_eq!(counts.counts[1], 1);
    assert!(counts.counts[2..].iter().all(|c| *c == 0));

    assert_eq!(report.revenue[0].revenue[0], Some(dec!(40)));
    assert_eq!(report.revenue[0].revenue[1], Some(dec!(5)));

    assert_eq!(report.retention[0].cohort_size, 2);
    assert_eq!(report.retention[0].rates[0], Some(50.0));
    assert_eq!(report.churn[0].rates[0], Some(50.0));

    assert_eq!(report.average_spend[0].average[0], Some(dec!(20)));
    assert_eq!(report.average_spend[0].average[1], Some(dec!(5)));
    assert_eq!(report.average_spend[0].average[2], None);

    let precision = ReportConfig::default();
    let retention = report.render(ReportKind::Retention, &precision);
    assert_eq!(retention.cell(jan, 0), Some(&Cell::Count(2)));
    assert_eq!(retention.cell(jan, 1).unwrap().to_string(), "50.00");
    let churn = report.render(ReportKind::Churn, &precision);
    assert_eq!(churn.cell(jan, 1).unwrap().to_string(), "50.00");
    let spend = report.render(ReportKind::AverageSpend, &precision);
    assert_eq!(spend.cell(jan, 0).unwrap().to_string(), "20");
    assert_eq!(spend.cell(jan, 1).unwrap().to_string(), "5");
    assert_eq!(spend.cell(jan, 2), Some(&Cell::NoData));
}

#[test]
fn cohort_never_after_any_valid_purchase() {
    let records = vec![
        tx(Some("x"), "1", 1, dec!(1), at(2011, 5, 1)),
        tx(Some("x"), "2", 1, dec!(1), at(2011, 3, 31)),
        tx(Some("x"), "3", 1, dec!(1), at(2011, 9, 9)),
        tx(Some("y"), "4", 1, dec!(1), at(2010, 12, 1)),
        tx(Some("y"), "5", 1, dec!(1), at(2011, 1, 1)),
    ];
    let (valid, _) = filter_with_stats(&records);
    let assignments = assign_cohorts(&valid);

    for t in &valid {
        assert!(assignments.get(t.customer_id()).unwrap() <= t.month());
    }
    assert_eq!(assignments.get("x"), Some(month(2011, 3)));
    let bucketed = bucket_all(&valid, &assignments, 12);
    assert!(bucketed.buckets.iter().all(|b| b.month_offset <= 12));
}

#[test]
fn offset_zero_equals_cohort_size() {
    let records = vec![
        tx(Some("a"), "1", 1, dec!(1), at(2011, 1, 2)),
        tx(Some("b"), "2", 1, dec!(1), at(2011, 1, 30)),
        tx(Some("c"), "3", 1, dec!(1), at(2011, 1, 15)),
        tx(Some("c"), "4", 1, dec!(1), at(2011, 1, 16)),
        tx(Some("d"), "5", 1, dec!(1), at(2011, 2, 1)),
    ];
    let report = CohortPipeline::default().run(&records);

    assert_eq!(report.counts[0].counts[0], 3);
    assert_eq!(report.counts[1].cohort_month, month(2011, 2));
    assert_eq!(report.counts[1].counts[0], 1);
}

#[test]
fn retention_and_churn_follow_counts() {
    let mut records = Vec::new();
    for (i, m) in [1u32, 1, 1, 1, 2, 2, 3, 5].iter().enumerate() {
        let customer = format!("c{}", i % 4);
        records.push(tx(Some(customer.as_str()), &i.to_string(), 1, dec!(2), at(2011, *m, 10)));
    }
    let report = CohortPipeline::default().run(&records);

    for (counts, (ret, churn)) in report
        .counts
        .iter()
        .zip(report.retention.iter().zip(&report.churn))
    {
        for k in 1..counts.counts.len() {
            let expected = 100.0 * counts.counts[k] as f64 / counts.counts[0] as f64;
            let r = ret.rates[k - 1].unwrap();
            assert!((r - expected).abs() < 1e-9);
            assert!((churn.rates[k - 1].unwrap() - (100.0 - r)).abs() < 1e-9);
        }
    }
}

#[test]
fn average_spend_missing_iff_count_zero() {
    let records = vec![
        tx(Some("a"), "1", 1, dec!(3), at(2011, 1, 2)),
        tx(Some("a"), "2", 1, dec!(3), at(2011, 4, 2)),
        tx(Some("b"), "3", 1, dec!(3), at(2011, 2, 2)),
    ];
    let report = CohortPipeline::default().run(&records);

    for (counts, spend) in report.counts.iter().zip(&report.average_spend) {
        for (count, avg) in counts.counts.iter().zip(&spend.average) {
            assert_eq!(*count == 0, avg.is_none());
        }
    }
}

#[test]
fn rerun_is_idempotent() {
    let records = two_customer_scenario();
    let mut pipeline = CohortPipeline::default();
    let first = pipeline.run(&records);
    let second = pipeline.run(&records);
    assert_eq!(first, second);
}

#[test]
fn negative_quantity_never_reaches_aggregates() {
    let mut records = two_customer_scenario();
    records.push(tx(Some("A"), "1004", -5, dec!(10), at(2011, 1, 20)));
    records.push(tx(Some("Z"), "1005", -5, dec!(10), at(2010, 11, 20)));

    let report = CohortPipeline::default().run(&records);
    assert_eq!(report.counts.len(), 1);
    assert_eq!(report.revenue[0].revenue[0], Some(dec!(40)));
}

#[test]
fn null_customer_never_contributes() {
    let mut records = two_customer_scenario();
    records.push(tx(None, "2001", 4, dec!(100), at(2010, 12, 1)));
    records.push(tx(None, "2002", 4, dec!(100), at(2011, 1, 5)));

    let report = CohortPipeline::default().run(&records);
    assert_eq!(report.counts.len(), 1);
    assert_eq!(report.counts[0].counts[0], 2);
    assert_eq!(report.revenue[0].revenue[0], Some(dec!(40)));
}

#[test]
fn cancellation_excluded_even_if_positive() {
    let mut records = two_customer_scenario();
    records.push(tx(Some("C1"), "C3001", 3, dec!(7), at(2010, 12, 5)));

    let report = CohortPipeline::default().run(&records);
    assert_eq!(report.counts.len(), 1);
    assert_eq!(report.counts[0].cohort_month, month(2011, 1));
}

#[test]
fn malformed_timestamp_is_reported_not_counted() {
    let raws = vec![
        RawTransaction {
            customer_id: Some("A".into()),
            invoice_id: "1001".into(),
            quantity: 2,
            unit_price: dec!(10),
            invoice_date: "1/14/2011 9:30".into(),
        },
        RawTransaction {
            customer_id: Some("B".into()),
            invoice_id: "1002".into(),
            quantity: 1,
            unit_price: dec!(20),
            invoice_date: "2011-13-45".into(),
        },
    ];
    let out = CohortPipeline::default().run_raw(&raws);

    assert_eq!(out.rejected.len(), 1);
    assert_eq!(out.rejected[0].row, 1);
    assert_eq!(
        out.rejected[0].reason,
        RowError::InvalidTimestamp {
            value: "2011-13-45".into()
        }
    );
    assert_eq!(out.report.counts[0].counts[0], 1);
}

#[test]
fn late_purchases_beyond_horizon_keep_customer_in_cohort() {
    let records = vec![
        tx(Some("a"), "1", 1, dec!(1), at(2010, 12, 1)),
        tx(Some("a"), "2", 1, dec!(9), at(2011, 12, 31)),
        tx(Some("a"), "3", 1, dec!(99), at(2012, 1, 1)),
    ];
    let mut pipeline = CohortPipeline::default();
    let report = pipeline.run(&records);

    assert_eq!(report.counts[0].counts.len(), 13);
    assert_eq!(report.counts[0].counts[0], 1);
    assert_eq!(report.counts[0].counts[12], 1);
    assert_eq!(report.revenue[0].revenue[12], Some(dec!(9)));
    assert_eq!(pipeline.metrics().beyond_horizon, 1);
}

#[test]
fn raising_max_offset_extends_the_horizon() {
    let records = vec![
        tx(Some("a"), "1", 1, dec!(1), at(2010, 12, 1)),
        tx(Some("a"), "3", 1, dec!(99), at(2012, 1, 1)),
    ];
    let config = PipelineConfig {
        max_offset: 24,
        ..PipelineConfig::default()
    };
    let mut pipeline = CohortPipeline::new(config).unwrap();
    let report = pipeline.run(&records);

    assert_eq!(report.counts[0].counts.len(), 25);
    assert_eq!(report.counts[0].counts[13], 1);
    assert_eq!(
        report.render(ReportKind::Counts, &ReportConfig::default()).columns.last().map(String::as_str),
        Some("Month_24")
    );
}

#[test]
fn oversized_sale_value_is_excluded_without_panicking() {
    let records = vec![
        tx(Some("a"), "1", i64::MAX, dec!(10000000000), at(2011, 1, 3)),
        tx(Some("b"), "2", 2, dec!(10), at(2011, 1, 4)),
    ];
    let mut pipeline = CohortPipeline::default();
    let report = pipeline.run(&records);

    assert_eq!(report.counts[0].counts[0], 1);
    assert_eq!(report.revenue[0].revenue[0], Some(dec!(20)));
    assert_eq!(pipeline.metrics().filter.value_overflow, 1);
}

#[test]
fn overflowing_revenue_sum_reports_missing_cell() {
    let records: Vec<_> = (0..20)
        .map(|i| {
            tx(
                Some(format!("c{}", i).as_str()),
                &i.to_string(),
                i64::MAX,
                dec!(1000000000),
                at(2011, 1, 3),
            )
        })
        .collect();
    let mut pipeline = CohortPipeline::default();
    let report = pipeline.run(&records);

    assert_eq!(report.counts[0].counts[0], 20);
    assert_eq!(report.revenue[0].revenue[0], None);
    assert_eq!(report.average_spend[0].average[0], None);
    assert_eq!(pipeline.metrics().revenue_overflow, 1);

    let spend = report.render(ReportKind::AverageSpend, &ReportConfig::default());
    assert_eq!(spend.cell(month(2011, 1), 0), Some(&Cell::NoData));
}

#[test]
fn empty_input_gives_empty_tables() {
    let report = CohortPipeline::default().run(&[]);
    for table in report.render_all(&ReportConfig::default()) {
        assert!(table.rows.is_empty());
        assert_eq!(table.columns.len(), 13);
    }
}
