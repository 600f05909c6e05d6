//! Incremental updates of already-stored symbols.

use super::download::{FetchOptions, Fetcher, FetchProgress};
use super::kind::DatasetKind;
use super::merge::merge_ticker_data;
use super::provider::{HistoryRequest, MarketDataProvider};
use super::retry::Pacer;
use super::store::ParquetStore;
use super::table::TickerData;
use crate::config::FetchConfig;
use crate::symbol::Symbol;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Per-symbol update outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub results: BTreeMap<Symbol, bool>,
}

impl UpdateReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    pub fn failed_symbols(&self) -> Vec<Symbol> {
        self.results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }
}

/// Extends stored price history up to a target date.
pub struct Updater<'a> {
    fetcher: Fetcher<'a>,
    store: &'a ParquetStore,
}

impl<'a> Updater<'a> {
    pub fn new(
        provider: &'a dyn MarketDataProvider,
        store: &'a ParquetStore,
        config: &'a FetchConfig,
        pacer: &'a dyn Pacer,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(provider, Some(store), config, pacer),
            store,
        }
    }

    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.fetcher = self.fetcher.with_clock(now);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn FetchProgress) -> Self {
        self.fetcher = self.fetcher.with_progress(progress);
        self
    }

    /// Fetch everything after the last stored `ohlcv` date through `end`
    /// (default: today) and merge it in.
    ///
    /// Returns false when there is nothing stored to extend, when no new
    /// data came back, or when persisting failed.
    pub fn update_symbol(&self, symbol: &Symbol, end: Option<NaiveDate>, interval: &str) -> bool {
        tracing::info!(symbol = %symbol, "updating");
        let Some(latest) = self.store.latest_date(symbol, DatasetKind::Ohlcv) else {
            tracing::warn!(symbol = %symbol, "no stored price history, skipping update");
            return false;
        };
        let today = self.fetcher.now().date();
        let Some(start) = latest.succ_opt() else {
            return false;
        };
        if start > today {
            tracing::info!(symbol = %symbol, latest = %latest, "already up to date");
            return true;
        }
        let end = end.unwrap_or(today);
        if end < start {
            tracing::info!(symbol = %symbol, end = %end, "requested end precedes stored data");
            return true;
        }

        let request = HistoryRequest::range(start, end).with_interval(interval);
        if let Err(e) = request.validate() {
            tracing::error!(symbol = %symbol, error = %e, "invalid update request");
            return false;
        }
        let options = FetchOptions {
            force_refresh: true,
            write_through: false,
            auxiliary: false,
        };
        let mut fetched = self
            .fetcher
            .fetch_batch(std::slice::from_ref(symbol), &request, &options);
        let Some(fresh) = fetched.remove(symbol) else {
            tracing::warn!(symbol = %symbol, start = %start, end = %end, "no new data available");
            return false;
        };

        let existing = match self.store.load(symbol, None) {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "failed to load stored data");
                return false;
            }
        };
        let merged = merge_ticker_data(&existing, &fresh);
        let changed: TickerData = merged
            .into_iter()
            .filter(|(kind, _)| fresh.contains_key(kind))
            .collect();

        match self.store.save_all(symbol, &changed) {
            Ok(_) => {
                tracing::info!(symbol = %symbol, through = %end, "update stored");
                true
            }
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "failed to save updated data");
                false
            }
        }
    }

    /// Update each symbol in turn; one failure never stops the rest.
    pub fn update_symbols(
        &self,
        symbols: &[Symbol],
        end: Option<NaiveDate>,
        interval: &str,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        for symbol in symbols {
            let ok = self.update_symbol(symbol, end, interval);
            report.results.insert(symbol.clone(), ok);
        }
        tracing::info!(
            updated = report.succeeded(),
            total = symbols.len(),
            "update run complete"
        );
        let failed = report.failed_symbols();
        if !failed.is_empty() {
            let names: Vec<&str> = failed.iter().map(Symbol::as_str).collect();
            tracing::warn!(failed = %names.join(", "), "some symbols failed to update");
        }
        report
    }
}
