//! Cache freshness check.

use super::kind::DatasetKind;
use super::store::ParquetStore;
use crate::symbol::Symbol;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Whether a stored latest date is recent enough relative to `now`.
///
/// The date counts from midnight, so a table ending yesterday is fresh
/// for exactly one day at `max_age_days = 1`.
pub fn is_recent(latest: NaiveDate, max_age_days: u32, now: NaiveDateTime) -> bool {
    latest.and_time(NaiveTime::MIN) >= now - Duration::days(i64::from(max_age_days))
}

/// Whether stored data for `(symbol, kind)` can be used without refetching.
///
/// Missing tables, and kinds without a date index, are never fresh. Never
/// moves or rewrites store files.
pub fn is_fresh(
    store: &ParquetStore,
    symbol: &Symbol,
    kind: DatasetKind,
    max_age_days: u32,
    now: NaiveDateTime,
) -> bool {
    store
        .latest_date(symbol, kind)
        .is_some_and(|latest| is_recent(latest, max_age_days, now))
}
