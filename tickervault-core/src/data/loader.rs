//! Read-side helpers for analysing stored data.

use super::align::{align_series, AlignedSeries, Fill};
use super::kind::DatasetKind;
use super::provider::DataError;
use super::store::ParquetStore;
use super::table::{PriceBar, Snapshot, Statement, Table};
use crate::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A numeric column of the `ohlcv` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
    Dividends,
    StockSplits,
}

impl PriceField {
    pub const ALL: [PriceField; 8] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::AdjClose,
        PriceField::Volume,
        PriceField::Dividends,
        PriceField::StockSplits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::AdjClose => "adj_close",
            PriceField::Volume => "volume",
            PriceField::Dividends => "dividends",
            PriceField::StockSplits => "stock_splits",
        }
    }

    pub fn value(self, bar: &PriceBar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::AdjClose => bar.adj_close,
            PriceField::Volume => bar.volume as f64,
            PriceField::Dividends => bar.dividends,
            PriceField::StockSplits => bar.stock_splits,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace(' ', "_");
        PriceField::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| DataError::ValidationError(format!("unknown price field '{s}'")))
    }
}

/// One row of `data_summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSummary {
    pub symbol: Symbol,
    pub kinds: Vec<DatasetKind>,
    pub ohlcv_rows: Option<usize>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Symbols with at least one stored kind.
pub fn available_tickers(store: &ParquetStore) -> Result<Vec<Symbol>, DataError> {
    store.list_symbols()
}

/// Stored kinds per symbol, for one symbol or for all of them.
pub fn available_kinds(
    store: &ParquetStore,
    symbol: Option<&Symbol>,
) -> Result<BTreeMap<Symbol, Vec<DatasetKind>>, DataError> {
    let symbols = match symbol {
        Some(s) => vec![s.clone()],
        None => store.list_symbols()?,
    };
    Ok(symbols
        .into_iter()
        .map(|s| {
            let kinds = store.available_kinds(&s);
            (s, kinds)
        })
        .filter(|(_, kinds)| !kinds.is_empty())
        .collect())
}

/// Per-symbol overview of the store.
///
/// Uses the metadata sidecar when present and falls back to reading the
/// `ohlcv` file.
pub fn data_summary(store: &ParquetStore) -> Result<Vec<SymbolSummary>, DataError> {
    let mut rows = Vec::new();
    for symbol in store.list_symbols()? {
        let kinds = store.available_kinds(&symbol);
        let from_meta = store
            .get_meta(&symbol)
            .and_then(|meta| meta.kinds.get(&DatasetKind::Ohlcv).cloned())
            .filter(|_| kinds.contains(&DatasetKind::Ohlcv));
        let (ohlcv_rows, first_date, last_date) = match from_meta {
            Some(m) => (Some(m.rows), m.first_date, m.last_date),
            None => match store.load_kind(&symbol, DatasetKind::Ohlcv) {
                Some(table) => {
                    let range = table.date_range();
                    (
                        Some(table.row_count()),
                        range.map(|(first, _)| first),
                        range.map(|(_, last)| last),
                    )
                }
                None => (None, None, None),
            },
        };
        rows.push(SymbolSummary {
            symbol,
            kinds,
            ohlcv_rows,
            first_date,
            last_date,
        });
    }
    Ok(rows)
}

/// Stored price bars within an inclusive, optionally open-ended range.
pub fn load_history(
    store: &ParquetStore,
    symbol: &Symbol,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<PriceBar>, DataError> {
    let Some(Table::Prices(bars)) = store.load_kind(symbol, DatasetKind::Ohlcv) else {
        return Err(DataError::NoCachedData {
            symbol: symbol.to_string(),
        });
    };
    Ok(bars
        .into_iter()
        .filter(|b| start.map_or(true, |s| b.date >= s) && end.map_or(true, |e| b.date <= e))
        .collect())
}

/// Selected fields of the stored price history, one `(date, values)` row per bar.
pub fn load_history_fields(
    store: &ParquetStore,
    symbol: &Symbol,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    fields: &[PriceField],
) -> Result<Vec<(NaiveDate, Vec<f64>)>, DataError> {
    Ok(load_history(store, symbol, start, end)?
        .iter()
        .map(|bar| (bar.date, fields.iter().map(|f| f.value(bar)).collect()))
        .collect())
}

/// A stored statement, optionally restricted to some reporting periods.
///
/// `Ok(None)` when nothing is stored for the kind.
pub fn load_statement(
    store: &ParquetStore,
    symbol: &Symbol,
    kind: DatasetKind,
    periods: Option<&[NaiveDate]>,
) -> Result<Option<Statement>, DataError> {
    if !kind.is_statement() {
        return Err(DataError::InvalidRequest(format!(
            "'{kind}' is not a statement kind"
        )));
    }
    let Some(Table::Statement(mut statement)) = store.load_kind(symbol, kind) else {
        return Ok(None);
    };
    if let Some(periods) = periods {
        let available = statement.periods();
        if !periods.iter().any(|p| available.contains(p)) {
            tracing::warn!(symbol = %symbol, kind = %kind, "none of the requested periods are stored");
        }
        for row in statement.items.values_mut() {
            row.retain(|period, _| periods.contains(period));
        }
        statement.items.retain(|_, row| !row.is_empty());
    }
    Ok(Some(statement))
}

/// Stored company snapshot.
pub fn load_info(store: &ParquetStore, symbol: &Symbol) -> Option<Snapshot> {
    match store.load_kind(symbol, DatasetKind::Info)? {
        Table::Snapshot(snapshot) => Some(snapshot),
        _ => None,
    }
}

/// One price field for many symbols on a shared date axis.
///
/// Symbols without stored prices are skipped with a warning.
pub fn load_portfolio_history(
    store: &ParquetStore,
    symbols: &[Symbol],
    field: PriceField,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    fill: Fill,
) -> AlignedSeries {
    let mut series = BTreeMap::new();
    for symbol in symbols {
        match load_history(store, symbol, start, end) {
            Ok(bars) if !bars.is_empty() => {
                let points: Vec<(NaiveDate, f64)> =
                    bars.iter().map(|b| (b.date, field.value(b))).collect();
                series.insert(symbol.clone(), points);
            }
            Ok(_) => tracing::warn!(symbol = %symbol, "no prices in requested range"),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "skipping symbol"),
        }
    }
    align_series(&series, fill)
}
