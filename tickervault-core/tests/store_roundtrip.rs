//! Integration tests for the parquet store and the read-side loaders.

mod common;

use common::*;
use std::collections::BTreeMap;
use tickervault_core::data::loader::{self, PriceField};
use tickervault_core::data::{
    price_tables, DatasetKind, EventPoint, Fill, ParquetStore, Snapshot, Statement, Table,
    TickerData,
};

fn statement() -> Statement {
    let mut items = BTreeMap::new();
    items.insert(
        "Total Revenue".to_string(),
        BTreeMap::from([
            (date(2022, 12, 31), 1_000.0),
            (date(2023, 12, 31), 1_250.0),
        ]),
    );
    items.insert(
        "Net Income".to_string(),
        BTreeMap::from([(date(2023, 12, 31), 300.0)]),
    );
    Statement { items }
}

fn full_ticker() -> TickerData {
    let mut bars = daily_bars(date(2024, 1, 1), date(2024, 1, 10), 50.0);
    bars[2].dividends = 0.5;
    bars[6].stock_splits = 2.0;
    let mut data = price_tables(bars);
    data.insert(
        DatasetKind::Info,
        Table::Snapshot(Snapshot {
            fields: BTreeMap::from([
                ("longName".to_string(), "Example Corp".to_string()),
                ("sector".to_string(), "Technology".to_string()),
            ]),
        }),
    );
    data.insert(DatasetKind::Financials, Table::Statement(statement()));
    data.insert(
        DatasetKind::Earnings,
        Table::Events(vec![EventPoint {
            date: date(2023, 12, 31),
            value: 300.0,
        }]),
    );
    data
}

#[test]
fn every_kind_survives_a_store_roundtrip() {
    let dir = temp_data_dir();
    let store = ParquetStore::new(&dir);
    let data = full_ticker();

    let written = store.save_all(&sym("EXM"), &data).unwrap();
    assert_eq!(written, data.len());

    let loaded = store.load(&sym("EXM"), None).unwrap();
    assert_eq!(loaded, data);
    assert_eq!(
        loaded[&DatasetKind::Dividends],
        Table::Events(vec![EventPoint {
            date: date(2024, 1, 3),
            value: 0.5
        }])
    );

    let meta = store.get_meta(&sym("EXM")).unwrap();
    let ohlcv = &meta.kinds[&DatasetKind::Ohlcv];
    assert_eq!(ohlcv.rows, 10);
    assert_eq!(ohlcv.last_date, Some(date(2024, 1, 10)));
    assert_eq!(ohlcv.data_hash, data[&DatasetKind::Ohlcv].content_hash());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn summary_and_listing_cover_stored_symbols() {
    let dir = temp_data_dir();
    let store = ParquetStore::new(&dir);
    store.save_all(&sym("EXM"), &full_ticker()).unwrap();
    store
        .save(
            &sym("ONLY"),
            DatasetKind::Financials,
            &Table::Statement(statement()),
        )
        .unwrap();

    assert_eq!(
        loader::available_tickers(&store).unwrap(),
        vec![sym("EXM"), sym("ONLY")]
    );

    let summary = loader::data_summary(&store).unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].ohlcv_rows, Some(10));
    assert_eq!(summary[0].first_date, Some(date(2024, 1, 1)));
    assert_eq!(summary[1].kinds, vec![DatasetKind::Financials]);
    assert_eq!(summary[1].ohlcv_rows, None);

    let kinds = loader::available_kinds(&store, Some(&sym("ONLY"))).unwrap();
    assert_eq!(kinds[&sym("ONLY")], vec![DatasetKind::Financials]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn loaders_filter_by_date_and_period() {
    let dir = temp_data_dir();
    let store = ParquetStore::new(&dir);
    store.save_all(&sym("EXM"), &full_ticker()).unwrap();

    let window = loader::load_history(
        &store,
        &sym("EXM"),
        Some(date(2024, 1, 3)),
        Some(date(2024, 1, 5)),
    )
    .unwrap();
    assert_eq!(window.len(), 3);

    let fields = loader::load_history_fields(
        &store,
        &sym("EXM"),
        None,
        Some(date(2024, 1, 1)),
        &[PriceField::Close, PriceField::Volume],
    )
    .unwrap();
    assert_eq!(fields, vec![(date(2024, 1, 1), vec![50.0, 1_000.0])]);

    let latest_only = [date(2023, 12, 31)];
    let filtered = loader::load_statement(
        &store,
        &sym("EXM"),
        DatasetKind::Financials,
        Some(latest_only.as_slice()),
    )
    .unwrap()
    .unwrap();
    assert_eq!(filtered.periods(), vec![date(2023, 12, 31)]);
    assert_eq!(filtered.items.len(), 2);

    let info = loader::load_info(&store, &sym("EXM")).unwrap();
    assert_eq!(info.fields["sector"], "Technology");

    assert!(loader::load_history(&store, &sym("NONE"), None, None).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn portfolio_history_aligns_symbols() {
    let dir = temp_data_dir();
    let store = ParquetStore::new(&dir);
    store
        .save(
            &sym("AAA"),
            DatasetKind::Ohlcv,
            &Table::Prices(daily_bars(date(2024, 1, 1), date(2024, 1, 4), 10.0)),
        )
        .unwrap();
    store
        .save(
            &sym("BBB"),
            DatasetKind::Ohlcv,
            &Table::Prices(vec![bar(date(2024, 1, 2), 20.0)]),
        )
        .unwrap();

    let aligned = loader::load_portfolio_history(
        &store,
        &[sym("AAA"), sym("BBB"), sym("MISSING")],
        PriceField::Close,
        None,
        None,
        Fill::Forward,
    );

    assert_eq!(aligned.dates.len(), 4);
    assert_eq!(aligned.columns.len(), 2);
    assert_eq!(
        aligned.columns[&sym("BBB")],
        vec![None, Some(20.0), Some(20.0), Some(20.0)]
    );

    let _ = std::fs::remove_dir_all(&dir);
}
