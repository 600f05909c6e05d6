//! Dataset kinds: the fixed set of tables stored per symbol.

use super::provider::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One category of per-symbol data. Each kind maps to exactly one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Ohlcv,
    Dividends,
    Splits,
    Info,
    Financials,
    BalanceSheet,
    Cashflow,
    Earnings,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 8] = [
        DatasetKind::Ohlcv,
        DatasetKind::Dividends,
        DatasetKind::Splits,
        DatasetKind::Info,
        DatasetKind::Financials,
        DatasetKind::BalanceSheet,
        DatasetKind::Cashflow,
        DatasetKind::Earnings,
    ];

    /// Kinds fetched one request at a time after the price history.
    pub const AUXILIARY: [DatasetKind; 5] = [
        DatasetKind::Info,
        DatasetKind::Financials,
        DatasetKind::BalanceSheet,
        DatasetKind::Cashflow,
        DatasetKind::Earnings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Ohlcv => "ohlcv",
            DatasetKind::Dividends => "dividends",
            DatasetKind::Splits => "splits",
            DatasetKind::Info => "info",
            DatasetKind::Financials => "financials",
            DatasetKind::BalanceSheet => "balance_sheet",
            DatasetKind::Cashflow => "cashflow",
            DatasetKind::Earnings => "earnings",
        }
    }

    /// Kinds derived from the price history request.
    pub fn is_price_derived(self) -> bool {
        matches!(
            self,
            DatasetKind::Ohlcv | DatasetKind::Dividends | DatasetKind::Splits
        )
    }

    /// Kinds whose rows are keyed by a unique, ascending date.
    pub fn is_date_indexed(self) -> bool {
        matches!(
            self,
            DatasetKind::Ohlcv | DatasetKind::Dividends | DatasetKind::Splits | DatasetKind::Earnings
        )
    }

    /// Line-item × period statement kinds.
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            DatasetKind::Financials | DatasetKind::BalanceSheet | DatasetKind::Cashflow
        )
    }

    /// Value column name for the single-column event kinds.
    pub fn event_column(self) -> Option<&'static str> {
        match self {
            DatasetKind::Dividends => Some("dividends"),
            DatasetKind::Splits => Some("stock_splits"),
            DatasetKind::Earnings => Some("net_income"),
            _ => None,
        }
    }

    /// File name inside the symbol directory.
    pub fn file_name(self) -> String {
        format!("{}.parquet", self.as_str())
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DataError::ValidationError(format!("unknown dataset kind '{s}'")))
    }
}
