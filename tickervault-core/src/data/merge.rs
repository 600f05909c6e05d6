//! Incremental merge of freshly fetched tables into stored ones.
//!
//! Date-indexed kinds are unioned by date with the fresh row winning, then
//! sorted ascending. Statements union their period cells per line item,
//! fresh values winning. Snapshots are replaced by the fresh one. Kinds
//! present on only one side are carried through unchanged.

use super::table::{EventPoint, PriceBar, Statement, Table, TickerData};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Merge one kind's tables.
pub fn merge_table(existing: &Table, fresh: &Table) -> Table {
    match (existing, fresh) {
        (Table::Prices(old), Table::Prices(new)) => {
            Table::Prices(merge_by_date(old, new, |b: &PriceBar| b.date))
        }
        (Table::Events(old), Table::Events(new)) => {
            Table::Events(merge_by_date(old, new, |p: &EventPoint| p.date))
        }
        (Table::Statement(old), Table::Statement(new)) => {
            Table::Statement(merge_statement(old, new))
        }
        // Snapshot replacement, and any shape mismatch: the fresh table wins.
        _ => fresh.clone(),
    }
}

/// Merge every kind present in either input.
pub fn merge_ticker_data(existing: &TickerData, fresh: &TickerData) -> TickerData {
    let mut merged = existing.clone();
    for (kind, new_table) in fresh {
        let table = match existing.get(kind) {
            Some(old_table) => merge_table(old_table, new_table),
            None => new_table.clone(),
        };
        merged.insert(*kind, table);
    }
    merged
}

fn merge_by_date<R: Clone>(existing: &[R], fresh: &[R], date: impl Fn(&R) -> NaiveDate) -> Vec<R> {
    let mut rows: BTreeMap<NaiveDate, R> = BTreeMap::new();
    for row in existing.iter().chain(fresh) {
        rows.insert(date(row), row.clone());
    }
    rows.into_values().collect()
}

fn merge_statement(existing: &Statement, fresh: &Statement) -> Statement {
    let mut merged = existing.clone();
    for (item, cells) in &fresh.items {
        let row = merged.items.entry(item.clone()).or_default();
        for (period, value) in cells {
            row.insert(*period, *value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::kind::DatasetKind;
    use crate::data::table::fixtures::{bar, date};
    use crate::data::table::Snapshot;

    fn days(range: std::ops::RangeInclusive<u32>, close: f64) -> Vec<PriceBar> {
        range.map(|d| bar(date(2024, 1, d), close)).collect()
    }

    #[test]
    fn overlapping_ranges_take_fresh_values() {
        let existing = Table::Prices(days(1..=5, 1.0));
        let fresh = Table::Prices(days(4..=8, 2.0));

        let Table::Prices(merged) = merge_table(&existing, &fresh) else {
            panic!("expected prices");
        };
        let dates: Vec<u32> = merged.iter().map(|b| chrono::Datelike::day(&b.date)).collect();
        assert_eq!(dates, (1..=8).collect::<Vec<_>>());
        assert!(merged[..3].iter().all(|b| b.close == 1.0));
        assert!(merged[3..].iter().all(|b| b.close == 2.0));
    }

    #[test]
    fn merging_with_itself_is_idempotent() {
        let table = Table::Prices(days(1..=5, 1.0));
        assert_eq!(merge_table(&table, &table), table);

        let events = Table::Events(vec![EventPoint {
            date: date(2024, 1, 3),
            value: 0.5,
        }]);
        assert_eq!(merge_table(&events, &events), events);
    }

    #[test]
    fn one_sided_kinds_are_kept() {
        let mut existing = TickerData::new();
        existing.insert(DatasetKind::Ohlcv, Table::Prices(days(1..=2, 1.0)));
        existing.insert(
            DatasetKind::Dividends,
            Table::Events(vec![EventPoint {
                date: date(2024, 1, 1),
                value: 0.2,
            }]),
        );
        let mut fresh = TickerData::new();
        fresh.insert(DatasetKind::Ohlcv, Table::Prices(days(3..=3, 1.0)));
        fresh.insert(DatasetKind::Info, Table::Snapshot(Snapshot::default()));

        let merged = merge_ticker_data(&existing, &fresh);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[&DatasetKind::Ohlcv].row_count(), 3);
        assert_eq!(merged[&DatasetKind::Dividends], existing[&DatasetKind::Dividends]);
    }

    #[test]
    fn statements_union_periods_with_fresh_winning() {
        let mut old = Statement::default();
        let row = old.items.entry("Net Income".into()).or_default();
        row.insert(date(2022, 12, 31), 1.0);
        row.insert(date(2023, 12, 31), 2.0);
        let mut new = Statement::default();
        new.items
            .entry("Net Income".into())
            .or_default()
            .insert(date(2023, 12, 31), 3.0);

        let Table::Statement(merged) =
            merge_table(&Table::Statement(old), &Table::Statement(new))
        else {
            panic!("expected statement");
        };
        let row = &merged.items["Net Income"];
        assert_eq!(row[&date(2022, 12, 31)], 1.0);
        assert_eq!(row[&date(2023, 12, 31)], 3.0);
    }

    #[test]
    fn snapshot_is_replaced() {
        let mut a = Snapshot::default();
        a.fields.insert("sector".into(), "Energy".into());
        let mut b = Snapshot::default();
        b.fields.insert("industry".into(), "Oil".into());
        assert_eq!(
            merge_table(&Table::Snapshot(a), &Table::Snapshot(b.clone())),
            Table::Snapshot(b)
        );
    }
}
