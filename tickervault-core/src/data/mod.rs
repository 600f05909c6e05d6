//! Market data: provider abstraction, parquet store, fetch and update orchestration.

pub mod align;
mod codec;
pub mod download;
pub mod freshness;
pub mod kind;
pub mod loader;
pub mod merge;
pub mod priority;
pub mod provider;
pub mod retry;
pub mod store;
pub mod table;
pub mod update;
pub mod yahoo;

pub use align::{AlignedSeries, Fill};
pub use download::{FetchOptions, FetchProgress, FetchReport, Fetcher, StdoutProgress};
pub use freshness::is_fresh;
pub use kind::DatasetKind;
pub use merge::{merge_table, merge_ticker_data};
pub use priority::{chunk, prioritize};
pub use provider::{
    BulkResponse, DataError, FailureClass, HistoryRequest, MarketDataProvider, Span,
};
pub use retry::{Pacer, RetryPolicy, ThreadPacer};
pub use store::{ParquetStore, StoreMeta};
pub use table::{price_tables, EventPoint, PriceBar, Snapshot, Statement, Table, TickerData};
pub use update::{UpdateReport, Updater};
pub use yahoo::YahooProvider;
