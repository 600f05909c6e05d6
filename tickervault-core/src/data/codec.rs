//! Table <-> Polars DataFrame conversion at the parquet boundary.
//!
//! Column layouts per kind:
//! - `ohlcv`: date, open, high, low, close, adj_close, volume, dividends, stock_splits
//! - `dividends` / `splits` / `earnings`: date + one Float64 value column
//! - statements: `line_item` + one Float64 column per period (`YYYY-MM-DD`)
//! - `info`: a single row of String columns

use super::kind::DatasetKind;
use super::provider::DataError;
use super::table::{EventPoint, PriceBar, Snapshot, Statement, Table};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

const OHLCV_COLUMNS: [&str; 9] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
    "dividends",
    "stock_splits",
];

const LINE_ITEM: &str = "line_item";
const PERIOD_FORMAT: &str = "%Y-%m-%d";

/// 1970-01-01, the origin of Polars' Date physical type.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn polars_err(context: &'static str) -> impl Fn(PolarsError) -> DataError {
    move |e| DataError::ParquetError(format!("{context}: {e}"))
}

fn date_column(dates: Vec<i32>) -> Result<Column, DataError> {
    Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .map_err(polars_err("date cast"))
}

/// Encode a table for the given kind.
pub(crate) fn table_to_frame(kind: DatasetKind, table: &Table) -> Result<DataFrame, DataError> {
    let columns = match (kind, table) {
        (DatasetKind::Ohlcv, Table::Prices(bars)) => prices_columns(bars)?,
        (k, Table::Events(points)) if k.event_column().is_some() => {
            let value_name = k.event_column().unwrap_or("value");
            vec![
                date_column(points.iter().map(|p| days_since_epoch(p.date)).collect())?,
                Column::new(
                    value_name.into(),
                    points.iter().map(|p| p.value).collect::<Vec<f64>>(),
                ),
            ]
        }
        (k, Table::Statement(statement)) if k.is_statement() => statement_columns(statement),
        (DatasetKind::Info, Table::Snapshot(snapshot)) => snapshot
            .fields
            .iter()
            .map(|(name, value)| Column::new(name.as_str().into(), vec![value.clone()]))
            .collect(),
        (k, _) => {
            return Err(DataError::ValidationError(format!(
                "table shape does not match dataset kind '{k}'"
            )))
        }
    };
    DataFrame::new(columns).map_err(polars_err("dataframe creation"))
}

fn prices_columns(bars: &[PriceBar]) -> Result<Vec<Column>, DataError> {
    let f = |get: fn(&PriceBar) -> f64| bars.iter().map(get).collect::<Vec<f64>>();
    Ok(vec![
        date_column(bars.iter().map(|b| days_since_epoch(b.date)).collect())?,
        Column::new("open".into(), f(|b| b.open)),
        Column::new("high".into(), f(|b| b.high)),
        Column::new("low".into(), f(|b| b.low)),
        Column::new("close".into(), f(|b| b.close)),
        Column::new("adj_close".into(), f(|b| b.adj_close)),
        Column::new(
            "volume".into(),
            bars.iter().map(|b| b.volume).collect::<Vec<u64>>(),
        ),
        Column::new("dividends".into(), f(|b| b.dividends)),
        Column::new("stock_splits".into(), f(|b| b.stock_splits)),
    ])
}

fn statement_columns(statement: &Statement) -> Vec<Column> {
    let items: Vec<String> = statement.items.keys().cloned().collect();
    let mut columns = vec![Column::new(LINE_ITEM.into(), items)];
    for period in statement.periods() {
        let values: Vec<Option<f64>> = statement
            .items
            .values()
            .map(|row| row.get(&period).copied())
            .collect();
        let name = period.format(PERIOD_FORMAT).to_string();
        columns.push(Column::new(name.as_str().into(), values));
    }
    columns
}

/// Decode a frame read from disk, validating the expected columns.
pub(crate) fn frame_to_table(kind: DatasetKind, df: &DataFrame) -> Result<Table, DataError> {
    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    match kind {
        DatasetKind::Ohlcv => frame_to_prices(df).map(Table::Prices),
        DatasetKind::Dividends | DatasetKind::Splits | DatasetKind::Earnings => {
            let value_name = kind.event_column().unwrap_or("value");
            frame_to_events(df, value_name).map(Table::Events)
        }
        DatasetKind::Financials | DatasetKind::BalanceSheet | DatasetKind::Cashflow => {
            frame_to_statement(df).map(Table::Statement)
        }
        DatasetKind::Info => frame_to_snapshot(df).map(Table::Snapshot),
    }
}

fn require_columns(df: &DataFrame, names: &[&str]) -> Result<(), DataError> {
    for name in names {
        if df.column(name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{name}'")));
        }
    }
    Ok(())
}

fn read_dates(df: &DataFrame) -> Result<Vec<NaiveDate>, DataError> {
    let dates = df
        .column("date")
        .map_err(polars_err("column read"))?
        .date()
        .map_err(polars_err("date column type"))?;
    let origin = epoch();
    (0..df.height())
        .map(|i| {
            dates
                .get(i)
                .map(|days| origin + chrono::Duration::days(days as i64))
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))
        })
        .collect()
}

fn read_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DataError> {
    let column = df
        .column(name)
        .map_err(polars_err("column read"))?
        .cast(&DataType::Float64)
        .map_err(polars_err("float cast"))?;
    let values = column
        .f64()
        .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
    Ok((0..df.height()).map(|i| values.get(i)).collect())
}

fn frame_to_prices(df: &DataFrame) -> Result<Vec<PriceBar>, DataError> {
    require_columns(df, &OHLCV_COLUMNS)?;
    let dates = read_dates(df)?;
    let open = read_f64(df, "open")?;
    let high = read_f64(df, "high")?;
    let low = read_f64(df, "low")?;
    let close = read_f64(df, "close")?;
    let adj_close = read_f64(df, "adj_close")?;
    let dividends = read_f64(df, "dividends")?;
    let stock_splits = read_f64(df, "stock_splits")?;
    let volume_col = df
        .column("volume")
        .map_err(polars_err("column read"))?
        .cast(&DataType::UInt64)
        .map_err(polars_err("volume cast"))?;
    let volume = volume_col.u64().map_err(polars_err("volume column type"))?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| PriceBar {
            date,
            open: open[i].unwrap_or(f64::NAN),
            high: high[i].unwrap_or(f64::NAN),
            low: low[i].unwrap_or(f64::NAN),
            close: close[i].unwrap_or(f64::NAN),
            adj_close: adj_close[i].unwrap_or(f64::NAN),
            volume: volume.get(i).unwrap_or(0),
            dividends: dividends[i].unwrap_or(0.0),
            stock_splits: stock_splits[i].unwrap_or(0.0),
        })
        .collect())
}

fn frame_to_events(df: &DataFrame, value_name: &str) -> Result<Vec<EventPoint>, DataError> {
    require_columns(df, &["date", value_name])?;
    let dates = read_dates(df)?;
    let values = read_f64(df, value_name)?;
    Ok(dates
        .into_iter()
        .zip(values)
        .filter_map(|(date, value)| value.map(|value| EventPoint { date, value }))
        .collect())
}

fn frame_to_statement(df: &DataFrame) -> Result<Statement, DataError> {
    require_columns(df, &[LINE_ITEM])?;
    let items_col = df
        .column(LINE_ITEM)
        .map_err(polars_err("column read"))?
        .cast(&DataType::String)
        .map_err(polars_err("line_item cast"))?;
    let items = items_col.str().map_err(polars_err("line_item column type"))?;

    let mut statement = Statement::default();
    for name in df.get_column_names() {
        let name = name.as_str();
        if name == LINE_ITEM {
            continue;
        }
        let period = NaiveDate::parse_from_str(name, PERIOD_FORMAT).map_err(|_| {
            DataError::ValidationError(format!("statement column '{name}' is not a period"))
        })?;
        for (i, value) in read_f64(df, name)?.into_iter().enumerate() {
            let (Some(item), Some(value)) = (items.get(i), value) else {
                continue;
            };
            statement
                .items
                .entry(item.to_string())
                .or_default()
                .insert(period, value);
        }
    }
    Ok(statement)
}

fn frame_to_snapshot(df: &DataFrame) -> Result<Snapshot, DataError> {
    let mut fields = BTreeMap::new();
    for column in df.get_columns() {
        let text = column
            .cast(&DataType::String)
            .map_err(polars_err("info cast"))?;
        let values = text.str().map_err(polars_err("info column type"))?;
        if let Some(value) = values.get(0) {
            fields.insert(column.name().to_string(), value.to_string());
        }
    }
    Ok(Snapshot { fields })
}
