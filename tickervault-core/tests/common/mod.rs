//! Shared helpers: a scripted provider, a recording pacer and temp stores.

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tickervault_core::data::{
    BulkResponse, DataError, DatasetKind, HistoryRequest, MarketDataProvider, Pacer, PriceBar,
    Span, Table,
};
use tickervault_core::{FetchConfig, Symbol};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn temp_data_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "tickervault_it_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn noon(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(12, 0, 0).unwrap()
}

pub fn bar(date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        date,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        adj_close: close,
        volume: 1_000,
        dividends: 0.0,
        stock_splits: 0.0,
    }
}

/// One bar per calendar day over `[start, end]`.
pub fn daily_bars(start: NaiveDate, end: NaiveDate, close: f64) -> Vec<PriceBar> {
    let mut out = Vec::new();
    let mut d = start;
    while d <= end {
        out.push(bar(d, close));
        d += ChronoDuration::days(1);
    }
    out
}

/// Production delays and counts, with jitter removed and 3 attempts.
pub fn test_config() -> FetchConfig {
    FetchConfig {
        max_retries: 3,
        jitter_max: Duration::ZERO,
        ..FetchConfig::default()
    }
}

/// Records pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

impl RecordingPacer {
    pub fn taken(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    pub fn count(&self, duration: Duration) -> usize {
        self.taken().iter().filter(|d| **d == duration).count()
    }
}

/// A remote call seen by the scripted provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Download(Vec<Symbol>, HistoryRequest),
    History(Symbol, HistoryRequest),
    Auxiliary(Symbol, DatasetKind),
}

/// Scripted failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    RateLimited,
    Timeout,
    NotFound,
}

impl Failure {
    fn error(self, symbol: &str) -> DataError {
        match self {
            Failure::RateLimited => DataError::RateLimited {
                retry_after_secs: None,
            },
            Failure::Timeout => DataError::NetworkUnreachable("operation timed out".into()),
            Failure::NotFound => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
        }
    }
}

/// In-memory provider driven by a fixed script; logs every call.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    histories: BTreeMap<Symbol, Vec<PriceBar>>,
    bulk_omits: BTreeSet<Symbol>,
    bulk_failure: Option<Failure>,
    symbol_failures: BTreeMap<Symbol, Failure>,
    aux: BTreeMap<(Symbol, DatasetKind), Table>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.histories.insert(sym(symbol), bars);
        self
    }

    /// Leave the symbol out of grouped bulk responses.
    pub fn omit_from_bulk(mut self, symbol: &str) -> Self {
        self.bulk_omits.insert(sym(symbol));
        self
    }

    /// Every bulk request fails this way.
    pub fn failing_bulk(mut self, failure: Failure) -> Self {
        self.bulk_failure = Some(failure);
        self
    }

    /// Every request touching the symbol fails this way.
    pub fn failing_symbol(mut self, symbol: &str, failure: Failure) -> Self {
        self.symbol_failures.insert(sym(symbol), failure);
        self
    }

    pub fn with_aux(mut self, symbol: &str, kind: DatasetKind, table: Table) -> Self {
        self.aux.insert((sym(symbol), kind), table);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(Vec<Symbol>, HistoryRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Download(symbols, request) => Some((symbols, request)),
                _ => None,
            })
            .collect()
    }

    pub fn history_calls(&self, symbol: &str) -> usize {
        let wanted = sym(symbol);
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::History(s, _) if *s == wanted))
            .count()
    }

    pub fn aux_calls(&self, symbol: &str) -> usize {
        let wanted = sym(symbol);
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Auxiliary(s, _) if *s == wanted))
            .count()
    }

    fn bars_for(&self, symbol: &Symbol, request: &HistoryRequest) -> Vec<PriceBar> {
        let bars = self.histories.get(symbol).cloned().unwrap_or_default();
        match request.span {
            Span::Range { start, end } => bars
                .into_iter()
                .filter(|b| b.date >= start && b.date <= end)
                .collect(),
            Span::Period(_) => bars,
        }
    }
}

impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn download(
        &self,
        symbols: &[Symbol],
        request: &HistoryRequest,
    ) -> Result<BulkResponse, DataError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Download(symbols.to_vec(), request.clone()));
        if let Some(failure) = self.bulk_failure {
            return Err(failure.error("batch"));
        }
        if let Some((symbol, failure)) = symbols
            .iter()
            .find_map(|s| self.symbol_failures.get(s).map(|f| (s, *f)))
        {
            return Err(failure.error(symbol.as_str()));
        }
        if let [only] = symbols {
            return Ok(BulkResponse::Single(self.bars_for(only, request)));
        }
        let grouped = symbols
            .iter()
            .filter(|s| !self.bulk_omits.contains(*s))
            .map(|s| (s.clone(), self.bars_for(s, request)))
            .filter(|(_, bars)| !bars.is_empty())
            .collect();
        Ok(BulkResponse::Grouped(grouped))
    }

    fn history(
        &self,
        symbol: &Symbol,
        request: &HistoryRequest,
    ) -> Result<Vec<PriceBar>, DataError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::History(symbol.clone(), request.clone()));
        if let Some(failure) = self.symbol_failures.get(symbol) {
            return Err(failure.error(symbol.as_str()));
        }
        Ok(self.bars_for(symbol, request))
    }

    fn auxiliary(&self, symbol: &Symbol, kind: DatasetKind) -> Result<Option<Table>, DataError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Auxiliary(symbol.clone(), kind));
        if let Some(failure) = self.symbol_failures.get(symbol) {
            return Err(failure.error(symbol.as_str()));
        }
        Ok(self.aux.get(&(symbol.clone(), kind)).cloned())
    }
}
