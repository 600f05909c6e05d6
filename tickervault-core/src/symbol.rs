//! Ticker symbols: validation, normalization and the `tickers.txt` list.
//!
//! A symbol is 1–10 characters drawn from `A-Z`, `0-9`, `.`, `-` and `^`,
//! canonicalized to uppercase. Invalid input is dropped, never corrected.

use crate::data::provider::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Maximum symbol length accepted.
pub const MAX_SYMBOL_LEN: usize = 10;

/// Default file name for a saved ticker list inside the data directory.
pub const TICKER_FILE: &str = "tickers.txt";

/// A validated, uppercase ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Validate and uppercase a raw ticker.
    pub fn parse(raw: &str) -> Result<Self, DataError> {
        if raw.is_empty() || raw.chars().count() > MAX_SYMBOL_LEN {
            return Err(DataError::InvalidSymbol(raw.to_string()));
        }
        let upper = raw.to_ascii_uppercase();
        let valid = upper
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '^'));
        if !valid {
            return Err(DataError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a list of raw tickers, keeping the valid ones in input order.
///
/// Invalid tickers are logged and skipped. Duplicates (after uppercasing)
/// are kept only at their first position.
pub fn validate_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = Vec::with_capacity(raw.len());
    for r in raw {
        match Symbol::parse(r.as_ref()) {
            Ok(sym) => {
                if !out.contains(&sym) {
                    out.push(sym);
                }
            }
            Err(_) => tracing::warn!(ticker = r.as_ref(), "invalid ticker symbol, skipping"),
        }
    }
    out
}

/// Write validated tickers to `{data_dir}/tickers.txt`, one per line.
///
/// Returns the number of symbols written.
pub fn save_ticker_file<S: AsRef<str>>(raw: &[S], data_dir: &Path) -> Result<usize, DataError> {
    fs::create_dir_all(data_dir)
        .map_err(|e| DataError::StoreError(format!("create {}: {e}", data_dir.display())))?;
    let symbols = validate_symbols(raw);
    let mut body = String::new();
    for sym in &symbols {
        body.push_str(sym.as_str());
        body.push('\n');
    }
    let path = data_dir.join(TICKER_FILE);
    fs::write(&path, body)
        .map_err(|e| DataError::StoreError(format!("write {}: {e}", path.display())))?;
    tracing::info!(count = symbols.len(), path = %path.display(), "saved ticker list");
    Ok(symbols.len())
}

/// Read a ticker list file (blank lines ignored), validating each entry.
pub fn load_ticker_file(path: &Path) -> Result<Vec<Symbol>, DataError> {
    let content = fs::read_to_string(path)
        .map_err(|e| DataError::StoreError(format!("read {}: {e}", path.display())))?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let symbols = validate_symbols(&lines);
    tracing::info!(count = symbols.len(), path = %path.display(), "loaded ticker list");
    Ok(symbols)
}
