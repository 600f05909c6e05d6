//! Remote data provider trait and structured error types.
//!
//! The `MarketDataProvider` trait abstracts over the network data source so
//! the orchestration layer can be driven by Yahoo Finance in production and
//! by a scripted provider in tests. Providers know nothing about the store.

use super::kind::DatasetKind;
use super::table::{PriceBar, Table};
use crate::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Periods the history endpoint understands.
pub const VALID_PERIODS: [&str; 11] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

/// Bar intervals supported by the date-indexed store.
pub const VALID_INTERVALS: [&str; 5] = ["1d", "5d", "1wk", "1mo", "3mo"];

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and log lines.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (Too Many Requests)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("empty response: {0}")]
    EmptyResponse(String),

    #[error("provider error: {0}")]
    ProviderUnavailable(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("request forbidden: {0}")]
    Forbidden(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid ticker symbol: '{0}'")]
    InvalidSymbol(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no stored data for symbol '{symbol}'")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// How the retry engine should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Provider throttling: exponential backoff, then retry.
    RateLimited,
    /// Timeouts, malformed or empty payloads: short fixed delay, then retry.
    Transient,
    /// Retrying cannot help (unknown symbol, banned, bad request).
    Fatal,
}

impl DataError {
    /// Classify this error for the retry engine.
    pub fn class(&self) -> FailureClass {
        match self {
            DataError::RateLimited { .. } => FailureClass::RateLimited,
            DataError::NetworkUnreachable(_)
            | DataError::ResponseFormatChanged(_)
            | DataError::EmptyResponse(_)
            | DataError::ProviderUnavailable(_) => FailureClass::Transient,
            DataError::Other(msg) => {
                if msg.to_ascii_lowercase().contains("too many requests") {
                    FailureClass::RateLimited
                } else {
                    FailureClass::Transient
                }
            }
            DataError::AuthenticationRequired(_)
            | DataError::Forbidden(_)
            | DataError::SymbolNotFound { .. }
            | DataError::InvalidSymbol(_)
            | DataError::InvalidRequest(_)
            | DataError::StoreError(_)
            | DataError::ParquetError(_)
            | DataError::ValidationError(_)
            | DataError::NoCachedData { .. } => FailureClass::Fatal,
        }
    }
}

/// Time span of a history request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Span {
    /// Relative period ending now (`1y`, `max`, ...).
    Period(String),
    /// Inclusive calendar date range.
    Range { start: NaiveDate, end: NaiveDate },
}

/// Parameters of a price-history request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub span: Span,
    pub interval: String,
    /// Include pre- and post-market bars.
    pub prepost: bool,
    /// Include dividend and split events.
    pub actions: bool,
}

impl HistoryRequest {
    pub fn period(period: impl Into<String>) -> Self {
        Self {
            span: Span::Period(period.into()),
            interval: "1d".into(),
            prepost: false,
            actions: true,
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            span: Span::Range { start, end },
            interval: "1d".into(),
            prepost: false,
            actions: true,
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn is_range(&self) -> bool {
        matches!(self.span, Span::Range { .. })
    }

    /// Reject unknown periods, unsupported intervals and inverted ranges.
    pub fn validate(&self) -> Result<(), DataError> {
        if !VALID_INTERVALS.contains(&self.interval.as_str()) {
            return Err(DataError::InvalidRequest(format!(
                "unsupported interval '{}' (valid: {})",
                self.interval,
                VALID_INTERVALS.join(", ")
            )));
        }
        match &self.span {
            Span::Period(p) if !VALID_PERIODS.contains(&p.as_str()) => {
                Err(DataError::InvalidRequest(format!(
                    "unknown period '{p}' (valid: {})",
                    VALID_PERIODS.join(", ")
                )))
            }
            Span::Range { start, end } if start > end => Err(DataError::InvalidRequest(format!(
                "start {start} is after end {end}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Shape of a bulk history response.
///
/// A one-symbol request has no per-symbol grouping level, so providers
/// answer it with `Single`; wider requests come back `Grouped`.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkResponse {
    Single(Vec<PriceBar>),
    Grouped(BTreeMap<Symbol, Vec<PriceBar>>),
}

/// Trait for remote market data providers.
///
/// Implementations own transport concerns (URLs, parsing, status codes)
/// and report failures as `DataError`; retry policy lives above this trait.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// One combined history request covering every symbol in `symbols`.
    ///
    /// Symbols the provider has no data for are simply absent from a
    /// `Grouped` response.
    fn download(
        &self,
        symbols: &[Symbol],
        request: &HistoryRequest,
    ) -> Result<BulkResponse, DataError>;

    /// History for a single symbol.
    fn history(&self, symbol: &Symbol, request: &HistoryRequest)
        -> Result<Vec<PriceBar>, DataError>;

    /// One auxiliary dataset (`info` or a statement kind).
    ///
    /// `Ok(None)` means the provider has nothing for this kind.
    fn auxiliary(&self, symbol: &Symbol, kind: DatasetKind) -> Result<Option<Table>, DataError>;

    /// Failure classifier used by the retry engine.
    fn classify(&self, err: &DataError) -> FailureClass {
        err.class()
    }
}
