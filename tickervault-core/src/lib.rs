//! TickerVault Core: rate-limit-aware market data fetching and storage.
//!
//! This crate contains:
//! - Symbol validation and ticker list files
//! - A provider abstraction with a Yahoo Finance implementation
//! - A per-symbol, per-kind parquet store with freshness checks
//! - Fetch orchestration (prioritize, chunk, bulk with per-symbol fallback)
//! - Retry with exponential backoff on rate limiting
//! - Incremental updates that merge new rows into stored tables
//! - Read-side loaders for analysis

pub mod config;
pub mod data;
pub mod symbol;

pub use config::{AppConfig, ConfigError, FetchConfig};
pub use symbol::Symbol;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Symbol>();
        require_sync::<Symbol>();
        require_send::<FetchConfig>();
        require_sync::<FetchConfig>();
        require_send::<AppConfig>();
        require_sync::<AppConfig>();

        require_send::<data::Table>();
        require_sync::<data::Table>();
        require_send::<data::TickerData>();
        require_sync::<data::TickerData>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::ParquetStore>();
        require_sync::<data::ParquetStore>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::RetryPolicy>();
        require_sync::<data::RetryPolicy>();
        require_send::<data::FetchReport>();
        require_sync::<data::FetchReport>();
    }

    /// The orchestrator only sees providers through the trait object.
    #[test]
    fn provider_trait_is_object_safe() {
        fn _check(provider: &dyn data::MarketDataProvider) -> &str {
            provider.name()
        }
    }
}
