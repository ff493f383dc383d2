//! Presentation: rounding and tabular layout of a [`CohortReport`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

use cohort_core::config::ReportConfig;
use cohort_core::CohortMonth;

use super::CohortReport;

/// Which report table to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Counts,
    Retention,
    Churn,
    Revenue,
    AverageSpend,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Counts,
        ReportKind::Retention,
        ReportKind::Churn,
        ReportKind::Revenue,
        ReportKind::AverageSpend,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Counts => "Customer counts",
            ReportKind::Retention => "Retention (%)",
            ReportKind::Churn => "Churn (%)",
            ReportKind::Revenue => "Revenue",
            ReportKind::AverageSpend => "Average spend",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Counts => write!(f, "counts"),
            ReportKind::Retention => write!(f, "retention"),
            ReportKind::Churn => write!(f, "churn"),
            ReportKind::Revenue => write!(f, "revenue"),
            ReportKind::AverageSpend => write!(f, "spend"),
        }
    }
}

/// One rendered cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Count(u64),
    Value { value: f64, decimals: u32 },
    /// No customers at this offset.
    NoData,
}

impl Cell {
    fn rate(rate: Option<f64>, decimals: u32) -> Self {
        match rate {
            Some(r) => Cell::Value {
                value: round_f64(r, decimals),
                decimals,
            },
            None => Cell::NoData,
        }
    }

    fn money(value: Option<Decimal>, decimals: u32) -> Self {
        match value.and_then(|v| round_decimal(v, decimals)) {
            Some(v) => Cell::Value { value: v, decimals },
            None => Cell::NoData,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Count(c) => Some(*c as f64),
            Cell::Value { value, .. } => Some(*value),
            Cell::NoData => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Count(c) => write!(f, "{}", c),
            Cell::Value { value, decimals } => write!(f, "{:.*}", *decimals as usize, value),
            Cell::NoData => write!(f, "-"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Count(c) => serializer.serialize_u64(*c),
            Cell::Value { value, .. } => serializer.serialize_f64(*value),
            Cell::NoData => serializer.serialize_none(),
        }
    }
}

fn round_f64(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn round_decimal(value: Decimal, decimals: u32) -> Option<f64> {
    value
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cohort_month: CohortMonth,
    pub cells: Vec<Cell>,
}

/// A rounded table ready for display: one row per cohort, columns
/// `Month_0..Month_N`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub kind: ReportKind,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

fn month_columns(max_offset: u32) -> Vec<String> {
    (0..=max_offset).map(|k| format!("Month_{}", k)).collect()
}

impl CohortReport {
    /// Round and lay out one report table.
    pub fn render(&self, kind: ReportKind, precision: &ReportConfig) -> ReportTable {
        let rows = match kind {
            ReportKind::Counts => self
                .counts
                .iter()
                .map(|r| TableRow {
                    cohort_month: r.cohort_month,
                    cells: r.counts.iter().map(|c| Cell::Count(*c)).collect(),
                })
                .collect(),
            ReportKind::Retention => rate_rows(&self.retention, precision.percent_decimals),
            ReportKind::Churn => rate_rows(&self.churn, precision.percent_decimals),
            ReportKind::Revenue => self
                .revenue
                .iter()
                .map(|r| TableRow {
                    cohort_month: r.cohort_month,
                    cells: r
                        .revenue
                        .iter()
                        .map(|v| Cell::money(*v, precision.revenue_decimals))
                        .collect(),
                })
                .collect(),
            ReportKind::AverageSpend => self
                .average_spend
                .iter()
                .map(|r| TableRow {
                    cohort_month: r.cohort_month,
                    cells: r
                        .average
                        .iter()
                        .map(|v| Cell::money(*v, precision.spend_decimals))
                        .collect(),
                })
                .collect(),
        };

        ReportTable {
            kind,
            title: kind.title().to_string(),
            columns: month_columns(self.max_offset),
            rows,
        }
    }

    /// Render every table in the canonical order.
    pub fn render_all(&self, precision: &ReportConfig) -> Vec<ReportTable> {
        ReportKind::ALL
            .iter()
            .map(|kind| self.render(*kind, precision))
            .collect()
    }
}

/// Month_0 carries the raw cohort size, later months the percentage.
fn rate_rows(rows: &[super::RateRow], decimals: u32) -> Vec<TableRow> {
    rows.iter()
        .map(|r| {
            let mut cells = Vec::with_capacity(r.rates.len() + 1);
            cells.push(Cell::Count(r.cohort_size));
            cells.extend(r.rates.iter().map(|rate| Cell::rate(*rate, decimals)));
            TableRow {
                cohort_month: r.cohort_month,
                cells,
            }
        })
        .collect()
}

impl ReportTable {
    pub fn cell(&self, cohort_month: CohortMonth, offset: usize) -> Option<&Cell> {
        self.rows
            .iter()
            .find(|r| r.cohort_month == cohort_month)
            .and_then(|r| r.cells.get(offset))
    }
}

impl std::fmt::Display for ReportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header: Vec<String> = std::iter::once("Cohort".to_string())
            .chain(self.columns.iter().cloned())
            .collect();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                std::iter::once(r.cohort_month.to_string())
                    .chain(r.cells.iter().map(Cell::to_string))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(String::len).collect();
        for line in &body {
            for (w, cell) in widths.iter_mut().zip(line) {
                *w = (*w).max(cell.len());
            }
        }

        writeln!(f, "{}", self.title)?;
        for line in std::iter::once(&header).chain(body.iter()) {
            let mut first = true;
            for (cell, w) in line.iter().zip(&widths) {
                if first {
                    write!(f, "{:<w$}", cell, w = *w)?;
                    first = false;
                } else {
                    write!(f, "  {:>w$}", cell, w = *w)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
