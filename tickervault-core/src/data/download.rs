//! Fetch orchestrator: prioritizes, chunks and fetches symbol sets.
//!
//! Work is organised as daily chunks of batches. Each batch tries one bulk
//! request, falls back to per-symbol requests for members the bulk response
//! did not cover, then collects auxiliary datasets. Every result is written
//! through to the store as soon as it is obtained.
//!
//! Per-symbol failures never abort a run; they show up as missing entries
//! in the returned `FetchReport`.

use super::freshness::is_fresh;
use super::kind::DatasetKind;
use super::merge::merge_ticker_data;
use super::priority::{chunk, prioritize};
use super::provider::{BulkResponse, DataError, HistoryRequest, MarketDataProvider};
use super::retry::{Pacer, RetryPolicy};
use super::store::ParquetStore;
use super::table::{price_tables, PriceBar, TickerData};
use crate::config::FetchConfig;
use crate::symbol::{validate_symbols, Symbol};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Above this many symbols a run spans many days of quota.
pub const LARGE_RUN_WARNING: usize = 1000;

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ignore cache freshness and always go to the provider.
    pub force_refresh: bool,
    /// Persist each symbol's result as soon as it is fetched.
    pub write_through: bool,
    /// Also fetch info and statement kinds.
    pub auxiliary: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            force_refresh: false,
            write_through: true,
            auxiliary: true,
        }
    }
}

/// Progress callbacks for long fetch runs.
pub trait FetchProgress: Send + Sync {
    /// Called before each batch is processed.
    fn on_batch_start(&self, day: usize, batch: usize, total_batches: usize, symbols: &[Symbol]);

    /// Called after each batch with the number of symbols that produced data.
    fn on_batch_complete(&self, fetched: usize, batch_size: usize);

    /// Called once at the end of the run.
    fn on_run_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_batch_start(&self, day: usize, batch: usize, total_batches: usize, symbols: &[Symbol]) {
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        println!(
            "[day {} | batch {}/{}] {}",
            day + 1,
            batch + 1,
            total_batches,
            names.join(" ")
        );
    }

    fn on_batch_complete(&self, fetched: usize, batch_size: usize) {
        println!("  fetched {fetched}/{batch_size}");
    }

    fn on_run_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Outcome of a multi-symbol fetch run.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Valid, de-duplicated symbols that were requested.
    pub requested: Vec<Symbol>,
    /// Raw inputs rejected by symbol validation.
    pub rejected: Vec<String>,
    pub data: BTreeMap<Symbol, TickerData>,
    /// Requested symbols that produced no data.
    pub failed: Vec<Symbol>,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.data.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives a `MarketDataProvider` against an optional store.
pub struct Fetcher<'a> {
    provider: &'a dyn MarketDataProvider,
    store: Option<&'a ParquetStore>,
    config: &'a FetchConfig,
    retry: RetryPolicy,
    pacer: &'a dyn Pacer,
    progress: Option<&'a dyn FetchProgress>,
    now: NaiveDateTime,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        provider: &'a dyn MarketDataProvider,
        store: Option<&'a ParquetStore>,
        config: &'a FetchConfig,
        pacer: &'a dyn Pacer,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            retry: RetryPolicy::from_config(config),
            pacer,
            progress: None,
            now: chrono::Local::now().naive_local(),
        }
    }

    /// Fix the clock used for freshness decisions.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn FetchProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Fetch a whole symbol set.
    ///
    /// Errors only for an invalid request or a zero batch size or daily
    /// limit; everything else is reported per symbol.
    pub fn fetch_symbols<S: AsRef<str>>(
        &self,
        raw: &[S],
        request: &HistoryRequest,
        options: &FetchOptions,
    ) -> Result<FetchReport, DataError> {
        request.validate()?;
        let rejected: Vec<String> = raw
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| Symbol::parse(r).is_err())
            .map(str::to_string)
            .collect();
        let symbols = validate_symbols(raw);
        if symbols.len() > LARGE_RUN_WARNING {
            tracing::warn!(
                count = symbols.len(),
                daily_limit = self.config.daily_limit,
                "large symbol set; the run will span multiple daily chunks"
            );
        }

        let ordered = match self.store {
            Some(store) if !options.force_refresh => {
                prioritize(&symbols, store, self.config.max_cache_age_days, self.now)
            }
            _ => symbols.clone(),
        };

        let days = chunk(&ordered, self.config.daily_limit)?;
        tracing::info!(symbols = ordered.len(), days = days.len(), "split into daily chunks");

        let mut data = BTreeMap::new();
        for (day_index, day) in days.iter().enumerate() {
            if day_index > 0 {
                tracing::info!(
                    wait_secs = self.config.day_delay.as_secs_f64(),
                    "daily quota reached, pausing before next chunk"
                );
                self.pacer.pause(self.config.day_delay);
            }
            let batches = chunk(day, self.config.batch_size)?;
            tracing::info!(
                day = day_index + 1,
                of = days.len(),
                symbols = day.len(),
                "processing daily chunk"
            );
            for (batch_index, batch) in batches.iter().enumerate() {
                if let Some(progress) = self.progress {
                    progress.on_batch_start(day_index, batch_index, batches.len(), batch);
                }
                let fetched = self.fetch_batch(batch, request, options);
                if let Some(progress) = self.progress {
                    progress.on_batch_complete(fetched.len(), batch.len());
                }
                data.extend(fetched);
            }
        }

        let failed: Vec<Symbol> = ordered
            .iter()
            .filter(|s| !data.contains_key(*s))
            .cloned()
            .collect();
        tracing::info!(
            fetched = data.len(),
            requested = ordered.len(),
            "fetch run complete"
        );
        if let Some(progress) = self.progress {
            progress.on_run_complete(data.len(), failed.len(), ordered.len());
        }

        Ok(FetchReport {
            requested: symbols,
            rejected,
            data,
            failed,
        })
    }

    /// Fetch one batch. Symbols that yield nothing are absent from the map.
    pub fn fetch_batch(
        &self,
        batch: &[Symbol],
        request: &HistoryRequest,
        options: &FetchOptions,
    ) -> BTreeMap<Symbol, TickerData> {
        let mut out = BTreeMap::new();
        if batch.is_empty() {
            return out;
        }

        if let Some(cached) = self.cached_batch(batch, options) {
            tracing::info!(size = batch.len(), "batch entirely fresh in store, skipping fetch");
            return cached;
        }

        let label = match batch {
            [only] => only.to_string(),
            [first, .., last] => format!("{first}..{last}"),
            [] => String::new(),
        };
        let bulk = self.retry.run(
            &label,
            |e| self.provider.classify(e),
            self.pacer,
            |_| self.provider.download(batch, request),
        );
        self.pacer.pause(self.config.batch_delay);

        let mut present = self.bulk_members(batch, bulk);
        tracing::info!(
            received = present.len(),
            size = batch.len(),
            "bulk price request finished"
        );

        for symbol in batch {
            let data = match present.remove(symbol) {
                Some(bars) => {
                    let mut data = price_tables(bars);
                    if options.auxiliary {
                        data.extend(self.auxiliaries_for(symbol, options));
                    }
                    Some(data)
                }
                None => self.fetch_single(symbol, request, options),
            };
            let Some(data) = data else {
                tracing::warn!(symbol = %symbol, "no data obtained");
                continue;
            };
            if options.write_through {
                self.persist(symbol, &data, request);
            }
            out.insert(symbol.clone(), data);
        }
        out
    }

    /// Stored data for every member, if all of them are fresh.
    fn cached_batch(
        &self,
        batch: &[Symbol],
        options: &FetchOptions,
    ) -> Option<BTreeMap<Symbol, TickerData>> {
        let store = self.store?;
        if options.force_refresh {
            return None;
        }
        let max_age = self.config.max_cache_age_days;
        if !batch
            .iter()
            .all(|s| is_fresh(store, s, DatasetKind::Ohlcv, max_age, self.now))
        {
            return None;
        }
        let mut out = BTreeMap::new();
        for symbol in batch {
            match store.load(symbol, None) {
                Ok(data) if !data.is_empty() => {
                    out.insert(symbol.clone(), data);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "failed to load cached data"),
            }
        }
        Some(out)
    }

    /// Normalise the bulk response into per-symbol bar lists.
    fn bulk_members(
        &self,
        batch: &[Symbol],
        bulk: Option<BulkResponse>,
    ) -> BTreeMap<Symbol, Vec<PriceBar>> {
        let mut present = BTreeMap::new();
        match (bulk, batch) {
            (None, _) => {
                tracing::warn!(
                    size = batch.len(),
                    "bulk request failed, falling back to per-symbol requests"
                );
            }
            // One-symbol requests carry no per-symbol grouping.
            (Some(BulkResponse::Single(bars)), [only]) => {
                if !bars.is_empty() {
                    present.insert(only.clone(), bars);
                }
            }
            (Some(BulkResponse::Single(_)), _) => {
                tracing::warn!(
                    size = batch.len(),
                    "ungrouped bulk response for a multi-symbol batch, ignoring it"
                );
            }
            (Some(BulkResponse::Grouped(mut grouped)), _) => {
                for symbol in batch {
                    if let Some(bars) = grouped.remove(symbol).filter(|b| !b.is_empty()) {
                        present.insert(symbol.clone(), bars);
                    }
                }
            }
        }
        present
    }

    /// Fetch one symbol on its own, with retries.
    pub fn fetch_single(
        &self,
        symbol: &Symbol,
        request: &HistoryRequest,
        options: &FetchOptions,
    ) -> Option<TickerData> {
        let bars = self.retry.run(
            symbol.as_str(),
            |e| self.provider.classify(e),
            self.pacer,
            |_| {
                let bars = self.provider.history(symbol, request)?;
                if bars.is_empty() {
                    return Err(DataError::EmptyResponse(format!("no bars for {symbol}")));
                }
                Ok(bars)
            },
        );
        self.pacer.pause(self.config.request_delay);
        let bars = bars?;

        let mut data = price_tables(bars);
        if options.auxiliary {
            data.extend(self.auxiliaries_for(symbol, options));
        }
        tracing::info!(symbol = %symbol, kinds = data.len(), "fetched symbol");
        Some(data)
    }

    /// Auxiliary kinds for a symbol whose prices were just fetched.
    ///
    /// Copied from the store when the symbol's prices were already fresh
    /// there, otherwise fetched.
    fn auxiliaries_for(&self, symbol: &Symbol, options: &FetchOptions) -> TickerData {
        if let Some(store) = self.store.filter(|_| !options.force_refresh) {
            if is_fresh(
                store,
                symbol,
                DatasetKind::Ohlcv,
                self.config.max_cache_age_days,
                self.now,
            ) {
                let cached = store
                    .load(symbol, Some(&DatasetKind::AUXILIARY[..]))
                    .unwrap_or_default();
                if !cached.is_empty() {
                    tracing::debug!(symbol = %symbol, kinds = cached.len(), "reusing cached auxiliary data");
                    return cached;
                }
            }
        }
        self.fetch_auxiliaries(symbol)
    }

    /// Best-effort fetch of every auxiliary kind, pacing between requests.
    pub fn fetch_auxiliaries(&self, symbol: &Symbol) -> TickerData {
        let mut out = TickerData::new();
        for kind in DatasetKind::AUXILIARY {
            match self.provider.auxiliary(symbol, kind) {
                Ok(Some(table)) if !table.is_empty() => {
                    out.insert(kind, table);
                }
                Ok(_) => tracing::debug!(symbol = %symbol, kind = %kind, "no data for kind"),
                Err(e) if kind == DatasetKind::Info => {
                    tracing::warn!(symbol = %symbol, error = %e, "could not fetch info")
                }
                Err(e) => {
                    tracing::debug!(symbol = %symbol, kind = %kind, error = %e, "could not fetch kind")
                }
            }
            self.pacer.pause(self.config.request_delay);
        }
        out
    }

    /// Write-through. Date-range results merge into stored tables;
    /// period results replace them.
    fn persist(&self, symbol: &Symbol, data: &TickerData, request: &HistoryRequest) {
        let Some(store) = self.store else {
            return;
        };
        let result = if request.is_range() {
            let kinds: Vec<DatasetKind> = data.keys().copied().collect();
            store
                .load(symbol, Some(kinds.as_slice()))
                .map(|existing| merge_ticker_data(&existing, data))
                .and_then(|merged| store.save_all(symbol, &merged))
        } else {
            store.save_all(symbol, data)
        };
        match result {
            Ok(written) => tracing::debug!(symbol = %symbol, kinds = written, "persisted"),
            Err(e) => tracing::error!(symbol = %symbol, error = %e, "failed to persist fetched data"),
        }
    }
}
