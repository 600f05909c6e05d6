//! In-memory dataset tables.
//!
//! Every kind is held as plain Rust rows; Polars only appears at the
//! parquet boundary (see `codec`).

use super::kind::DatasetKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All tables fetched or stored for one symbol, keyed by kind.
pub type TickerData = BTreeMap<DatasetKind, Table>;

/// One price bar, with the corporate actions reported on that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
    /// Cash dividend paid on this date (0.0 when none).
    pub dividends: f64,
    /// Split ratio effective on this date (0.0 when none).
    pub stock_splits: f64,
}

/// A dated scalar: dividend amount, split ratio, or period net income.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Financial statement: line item → reporting period → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub items: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl Statement {
    /// Sorted union of all reporting periods.
    pub fn periods(&self) -> Vec<NaiveDate> {
        let mut periods: Vec<NaiveDate> = self
            .items
            .values()
            .flat_map(|row| row.keys().copied())
            .collect();
        periods.sort();
        periods.dedup();
        periods
    }

    pub fn is_empty(&self) -> bool {
        self.items.values().all(|row| row.is_empty())
    }
}

/// Single-row metadata snapshot (company profile, quote summary).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fields: BTreeMap<String, String>,
}

/// A dataset table of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Table {
    Prices(Vec<PriceBar>),
    Events(Vec<EventPoint>),
    Statement(Statement),
    Snapshot(Snapshot),
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Rows in the table (line items for statements, 1 for a non-empty snapshot).
    pub fn row_count(&self) -> usize {
        match self {
            Table::Prices(bars) => bars.len(),
            Table::Events(points) => points.len(),
            Table::Statement(s) => {
                if s.is_empty() {
                    0
                } else {
                    s.items.len()
                }
            }
            Table::Snapshot(s) => usize::from(!s.fields.is_empty()),
        }
    }

    /// First and last index date, for date-indexed tables.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates: Vec<NaiveDate> = match self {
            Table::Prices(bars) => bars.iter().map(|b| b.date).collect(),
            Table::Events(points) => points.iter().map(|p| p.date).collect(),
            Table::Statement(_) | Table::Snapshot(_) => return None,
        };
        let first = dates.iter().min()?;
        let last = dates.iter().max()?;
        Some((*first, *last))
    }

    /// Maximum index date, if the table has a temporal index.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.date_range().map(|(_, last)| last)
    }

    /// Deterministic BLAKE3 hash over the table contents.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        match self {
            Table::Prices(bars) => {
                for bar in bars {
                    hasher.update(bar.date.to_string().as_bytes());
                    hasher.update(&bar.open.to_le_bytes());
                    hasher.update(&bar.high.to_le_bytes());
                    hasher.update(&bar.low.to_le_bytes());
                    hasher.update(&bar.close.to_le_bytes());
                    hasher.update(&bar.adj_close.to_le_bytes());
                    hasher.update(&bar.volume.to_le_bytes());
                    hasher.update(&bar.dividends.to_le_bytes());
                    hasher.update(&bar.stock_splits.to_le_bytes());
                }
            }
            Table::Events(points) => {
                for p in points {
                    hasher.update(p.date.to_string().as_bytes());
                    hasher.update(&p.value.to_le_bytes());
                }
            }
            Table::Statement(s) => {
                for (item, row) in &s.items {
                    hasher.update(item.as_bytes());
                    for (period, value) in row {
                        hasher.update(period.to_string().as_bytes());
                        hasher.update(&value.to_le_bytes());
                    }
                }
            }
            Table::Snapshot(s) => {
                for (k, v) in &s.fields {
                    hasher.update(k.as_bytes());
                    hasher.update(v.as_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Build the price-derived tables from a fetched history.
///
/// `ohlcv` is always present for a non-empty history; `dividends` and
/// `splits` only when at least one row carries a positive value.
pub fn price_tables(mut bars: Vec<PriceBar>) -> TickerData {
    let mut out = TickerData::new();
    if bars.is_empty() {
        return out;
    }
    bars.sort_by_key(|b| b.date);
    bars.dedup_by(|later, earlier| {
        if later.date == earlier.date {
            *earlier = later.clone();
            true
        } else {
            false
        }
    });

    let dividends: Vec<EventPoint> = bars
        .iter()
        .filter(|b| b.dividends > 0.0)
        .map(|b| EventPoint {
            date: b.date,
            value: b.dividends,
        })
        .collect();
    let splits: Vec<EventPoint> = bars
        .iter()
        .filter(|b| b.stock_splits > 0.0)
        .map(|b| EventPoint {
            date: b.date,
            value: b.stock_splits,
        })
        .collect();

    if !dividends.is_empty() {
        out.insert(DatasetKind::Dividends, Table::Events(dividends));
    }
    if !splits.is_empty() {
        out.insert(DatasetKind::Splits, Table::Events(splits));
    }
    out.insert(DatasetKind::Ohlcv, Table::Prices(bars));
    out
}
