//! Fetch ordering and quota chunking.

use super::freshness::is_fresh;
use super::kind::DatasetKind;
use super::provider::DataError;
use super::store::ParquetStore;
use crate::symbol::Symbol;
use chrono::NaiveDateTime;

/// Order symbols as uncached, then stale, then fresh.
///
/// Relative input order is kept within each group, so the daily budget goes
/// to symbols that need data most.
pub fn prioritize(
    symbols: &[Symbol],
    store: &ParquetStore,
    max_age_days: u32,
    now: NaiveDateTime,
) -> Vec<Symbol> {
    let mut uncached = Vec::new();
    let mut stale = Vec::new();
    let mut fresh = Vec::new();
    for symbol in symbols {
        if !store.has_symbol(symbol) {
            uncached.push(symbol.clone());
        } else if is_fresh(store, symbol, DatasetKind::Ohlcv, max_age_days, now) {
            fresh.push(symbol.clone());
        } else {
            stale.push(symbol.clone());
        }
    }
    tracing::info!(
        uncached = uncached.len(),
        stale = stale.len(),
        fresh = fresh.len(),
        "prioritized symbols"
    );
    uncached.extend(stale);
    uncached.extend(fresh);
    uncached
}

/// Split `items` into contiguous chunks of `size`; the last may be shorter.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>, DataError> {
    if size == 0 {
        return Err(DataError::InvalidRequest(
            "chunk size must be greater than zero".into(),
        ));
    }
    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::testing::temp_data_dir;
    use crate::data::table::fixtures::{bar, date};
    use crate::data::table::Table;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn chunk_keeps_order_and_short_tail() {
        let chunks = chunk(&[1, 2, 3, 4, 5], 2).unwrap();
        assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert!(chunk::<u8>(&[], 3).unwrap().is_empty());
        assert!(chunk(&[1], 0).is_err());
    }

    #[test]
    fn uncached_then_stale_then_fresh() {
        let dir = temp_data_dir();
        let store = ParquetStore::new(&dir);
        let now = date(2024, 1, 15).and_hms_opt(12, 0, 0).unwrap();
        let stored = |s: &str, last| {
            store
                .save(&sym(s), DatasetKind::Ohlcv, &Table::Prices(vec![bar(last, 10.0)]))
                .unwrap();
        };
        stored("S1", date(2024, 1, 2));
        stored("F1", date(2024, 1, 15));
        stored("S2", date(2023, 12, 1));

        let input: Vec<Symbol> = ["F1", "U1", "S1", "U2", "S2", "U3"]
            .iter()
            .map(|s| sym(s))
            .collect();
        let ordered = prioritize(&input, &store, 1, now);
        let names: Vec<&str> = ordered.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["U1", "U2", "U3", "S1", "S2", "F1"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
