//! Yahoo Finance data provider.
//!
//! Price history comes from the v8 chart API; company profile and financial
//! statements from the v10 quoteSummary API. Neither is an official API and
//! both are subject to unannounced format changes, which surface as
//! `ResponseFormatChanged`.
//!
//! `history` and `auxiliary` perform exactly one HTTP request per call.
//! `download` issues one chart request per member, spaced by the member
//! delay. Retries and backoff belong to the orchestrator.

use super::kind::DatasetKind;
use super::provider::{BulkResponse, DataError, HistoryRequest, MarketDataProvider, Span};
use super::retry::{Pacer, ThreadPacer};
use super::table::{EventPoint, PriceBar, Snapshot, Statement, Table};
use crate::symbol::Symbol;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const INFO_MODULES: [&str; 4] = ["assetProfile", "summaryDetail", "price", "defaultKeyStatistics"];

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

/// Exchange offset from UTC in seconds; bar timestamps are session opens.
#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    numerator: f64,
    denominator: f64,
    date: i64,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    member_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            member_delay: Duration::ZERO,
        })
    }

    /// Pause between the per-symbol chart requests of one bulk download.
    pub fn with_member_delay(mut self, delay: Duration) -> Self {
        self.member_delay = delay;
        self
    }

    /// Build the chart API URL for a symbol and request.
    fn chart_url(symbol: &Symbol, request: &HistoryRequest) -> String {
        let span = match &request.span {
            Span::Period(period) => format!("range={period}"),
            Span::Range { start, end } => {
                let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
                // period2 is exclusive; include the whole end day.
                let end_ts = (*end + ChronoDuration::days(1))
                    .and_time(NaiveTime::MIN)
                    .and_utc()
                    .timestamp();
                format!("period1={start_ts}&period2={end_ts}")
            }
        };
        let events = if request.actions {
            "&events=div%2Csplit"
        } else {
            ""
        };
        format!(
            "{CHART_BASE}/{symbol}?{span}&interval={}&includePrePost={}{events}\
             &includeAdjustedClose=true",
            request.interval, request.prepost
        )
    }

    fn summary_url(symbol: &Symbol, modules: &[&str]) -> String {
        format!("{SUMMARY_BASE}/{symbol}?modules={}", modules.join("%2C"))
    }

    /// One GET, with HTTP status mapped onto `DataError`.
    fn get(&self, symbol: &Symbol, url: &str) -> Result<String, DataError> {
        tracing::debug!(symbol = %symbol, url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(DataError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::Forbidden(format!("HTTP 403 for {symbol}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if status.is_server_error() {
            return Err(DataError::ProviderUnavailable(format!("HTTP {status} for {symbol}")));
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        resp.text()
            .map_err(|e| DataError::NetworkUnreachable(format!("reading body for {symbol}: {e}")))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    /// The chart endpoint is per-symbol, so a bulk download is one chart
    /// call per member, spaced by the member delay. Members that fail are
    /// left out of the grouped response; the call only fails when no member
    /// succeeds.
    fn download(
        &self,
        symbols: &[Symbol],
        request: &HistoryRequest,
    ) -> Result<BulkResponse, DataError> {
        request.validate()?;
        if let [only] = symbols {
            return self.history(only, request).map(BulkResponse::Single);
        }

        collect_members(symbols, &ThreadPacer, self.member_delay, |symbol| {
            self.history(symbol, request)
        })
    }

    fn history(
        &self,
        symbol: &Symbol,
        request: &HistoryRequest,
    ) -> Result<Vec<PriceBar>, DataError> {
        request.validate()?;
        let body = self.get(symbol, &Self::chart_url(symbol, request))?;
        parse_chart(symbol, &body)
    }

    fn auxiliary(&self, symbol: &Symbol, kind: DatasetKind) -> Result<Option<Table>, DataError> {
        let modules: &[&str] = match kind {
            DatasetKind::Info => &INFO_MODULES,
            DatasetKind::Financials | DatasetKind::Earnings => &["incomeStatementHistory"],
            DatasetKind::BalanceSheet => &["balanceSheetHistory"],
            DatasetKind::Cashflow => &["cashflowStatementHistory"],
            other => {
                return Err(DataError::InvalidRequest(format!(
                    "'{other}' is not an auxiliary dataset"
                )))
            }
        };
        let body = self.get(symbol, &Self::summary_url(symbol, modules))?;
        parse_quote_summary(symbol, kind, &body)
    }
}

/// Fetch bulk members one at a time, pausing `delay` between requests.
///
/// Failed members are left out; the call fails only when none succeed.
/// A rate limit aborts the whole batch.
fn collect_members(
    symbols: &[Symbol],
    pacer: &dyn Pacer,
    delay: Duration,
    mut fetch: impl FnMut(&Symbol) -> Result<Vec<PriceBar>, DataError>,
) -> Result<BulkResponse, DataError> {
    let mut grouped = BTreeMap::new();
    let mut last_error = None;
    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            pacer.pause(delay);
        }
        match fetch(symbol) {
            Ok(bars) => {
                grouped.insert(symbol.clone(), bars);
            }
            Err(e @ DataError::RateLimited { .. }) => return Err(e),
            Err(e) => {
                tracing::debug!(symbol = %symbol, error = %e, "bulk member failed");
                last_error = Some(e);
            }
        }
    }
    if grouped.is_empty() {
        return Err(
            last_error.unwrap_or_else(|| DataError::EmptyResponse("empty symbol batch".into()))
        );
    }
    Ok(BulkResponse::Grouped(grouped))
}

/// Exchange-local calendar date of a UTC timestamp.
fn timestamp_date(ts: i64, gmtoffset: i64) -> Result<NaiveDate, DataError> {
    chrono::DateTime::from_timestamp(ts.saturating_add(gmtoffset), 0)
        .map(|dt| dt.naive_utc().date())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
}

/// Parse a chart API body into price bars with dividends and splits
/// folded onto their bar dates.
pub(crate) fn parse_chart(symbol: &Symbol, body: &str) -> Result<Vec<PriceBar>, DataError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse chart for {symbol}: {e}"))
    })?;

    let result = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) if err.code == "Not Found" => {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        }
        (_, Some(err)) => {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (Some(result), None) => result,
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::EmptyResponse(format!("no chart data for {symbol}")))?;
    let Some(timestamps) = data.timestamp else {
        return Err(DataError::EmptyResponse(format!("no bars for {symbol}")));
    };
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let offset = data.meta.gmtoffset;
    let events = data.events.unwrap_or_default();
    let mut dividends: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in events.dividends.values() {
        *dividends.entry(timestamp_date(event.date, offset)?).or_default() += event.amount;
    }
    let mut splits: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for event in events.splits.values() {
        if event.denominator != 0.0 {
            splits.insert(timestamp_date(event.date, offset)?, event.numerator / event.denominator);
        }
    }

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = timestamp_date(ts, offset)?;
        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Holidays come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }
        let close = close.unwrap_or(f64::NAN);
        let adj_close = adj_closes
            .as_ref()
            .and_then(|v| v.get(i).copied().flatten())
            .unwrap_or(close);

        bars.push(PriceBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close,
            adj_close,
            volume: volume.unwrap_or(0),
            dividends: dividends.get(&date).copied().unwrap_or(0.0),
            stock_splits: splits.get(&date).copied().unwrap_or(0.0),
        });
    }

    if bars.is_empty() {
        return Err(DataError::EmptyResponse(format!("no bars for {symbol}")));
    }
    Ok(bars)
}

/// Parse a quoteSummary body into the table for `kind`.
///
/// `Ok(None)` when the module is present but carries nothing usable.
pub(crate) fn parse_quote_summary(
    symbol: &Symbol,
    kind: DatasetKind,
    body: &str,
) -> Result<Option<Table>, DataError> {
    let root: Value = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse summary for {symbol}: {e}"))
    })?;
    let summary = root
        .get("quoteSummary")
        .ok_or_else(|| DataError::ResponseFormatChanged("missing quoteSummary".into()))?;
    if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_str).unwrap_or_default();
        if code == "Not Found" {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        return Err(DataError::ResponseFormatChanged(err.to_string()));
    }
    let Some(result) = summary
        .get("result")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
    else {
        return Ok(None);
    };

    let table = match kind {
        DatasetKind::Info => {
            let snapshot = info_snapshot(result);
            (!snapshot.fields.is_empty()).then_some(Table::Snapshot(snapshot))
        }
        DatasetKind::Financials => statement_at(result, "incomeStatementHistory", "incomeStatementHistory")
            .map(Table::Statement),
        DatasetKind::BalanceSheet => {
            statement_at(result, "balanceSheetHistory", "balanceSheetStatements").map(Table::Statement)
        }
        DatasetKind::Cashflow => {
            statement_at(result, "cashflowStatementHistory", "cashflowStatements")
                .map(Table::Statement)
        }
        DatasetKind::Earnings => {
            statement_at(result, "incomeStatementHistory", "incomeStatementHistory")
                .and_then(|s| net_income_events(&s))
                .map(Table::Events)
        }
        other => {
            return Err(DataError::InvalidRequest(format!(
                "'{other}' is not an auxiliary dataset"
            )))
        }
    };
    Ok(table)
}

/// Scalar text for a quoteSummary field: raw value first, then the formatted one.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => match obj.get("raw") {
            Some(raw @ (Value::Number(_) | Value::String(_) | Value::Bool(_))) => field_text(raw),
            _ => obj.get("fmt").and_then(Value::as_str).map(str::to_string),
        },
        Value::Null | Value::Array(_) => None,
    }
}

fn info_snapshot(result: &Value) -> Snapshot {
    let mut fields = BTreeMap::new();
    for module in INFO_MODULES {
        let Some(obj) = result.get(module).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in obj {
            if key == "maxAge" {
                continue;
            }
            if let Some(text) = field_text(value) {
                fields.entry(key.clone()).or_insert(text);
            }
        }
    }
    Snapshot { fields }
}

fn statement_at(result: &Value, module: &str, list: &str) -> Option<Statement> {
    let reports = result.get(module)?.get(list)?.as_array()?;
    let mut statement = Statement::default();
    for report in reports {
        let Some(period) = report_period(report) else {
            continue;
        };
        let Some(obj) = report.as_object() else {
            continue;
        };
        for (item, value) in obj {
            if item == "endDate" || item == "maxAge" {
                continue;
            }
            let raw = value.get("raw").and_then(Value::as_f64).or_else(|| value.as_f64());
            if let Some(raw) = raw {
                statement.items.entry(item.clone()).or_default().insert(period, raw);
            }
        }
    }
    (!statement.is_empty()).then_some(statement)
}

fn report_period(report: &Value) -> Option<NaiveDate> {
    let end = report.get("endDate")?;
    if let Some(fmt) = end.get("fmt").and_then(Value::as_str) {
        if let Ok(date) = NaiveDate::parse_from_str(fmt, "%Y-%m-%d") {
            return Some(date);
        }
    }
    end.get("raw")
        .and_then(Value::as_i64)
        .and_then(|ts| timestamp_date(ts, 0).ok())
}

fn net_income_events(statement: &Statement) -> Option<Vec<EventPoint>> {
    let row = statement.items.get("netIncome")?;
    let points: Vec<EventPoint> = row
        .iter()
        .map(|(date, value)| EventPoint {
            date: *date,
            value: *value,
        })
        .collect();
    (!points.is_empty()).then_some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::retry::testing::RecordingPacer;
    use crate::data::table::fixtures;

    fn aapl() -> Symbol {
        Symbol::parse("AAPL").unwrap()
    }

    // 2024-02-08 and 2024-02-09, 14:30 UTC.
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1707402600, 1707489000, 1707575400],
                "events": {
                    "dividends": {"1707402600": {"amount": 0.24, "date": 1707402600}},
                    "splits": {"1707489000": {"numerator": 4.0, "denominator": 1.0, "date": 1707489000}}
                },
                "indicators": {
                    "quote": [{
                        "open": [188.0, 189.0, null],
                        "high": [190.0, 191.0, null],
                        "low": [187.0, 188.0, null],
                        "close": [189.5, 190.5, null],
                        "volume": [1000, 1100, null]
                    }],
                    "adjclose": [{"adjclose": [189.0, 190.0, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn chart_folds_events_onto_bars_and_skips_null_rows() {
        let bars = parse_chart(&aapl(), CHART).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 2, 8).unwrap());
        assert_eq!(bars[0].dividends, 0.24);
        assert_eq!(bars[0].adj_close, 189.0);
        assert_eq!(bars[1].stock_splits, 4.0);
        assert_eq!(bars[1].volume, 1100);
    }

    #[test]
    fn chart_dates_follow_exchange_offset() {
        // 2024-02-07 23:00 UTC is 2024-02-08 09:00 at UTC+10.
        let body = r#"{"chart":{"result":[{
            "meta": {"gmtoffset": 36000},
            "timestamp": [1707346800],
            "events": {"dividends": {"1707346800": {"amount": 0.5, "date": 1707346800}}},
            "indicators": {"quote": [{"open": [10.0], "high": [11.0], "low": [9.5], "close": [10.5], "volume": [500]}]}
        }],"error":null}}"#;
        let bars = parse_chart(&aapl(), body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 2, 8).unwrap());
        assert_eq!(bars[0].dividends, 0.5);
    }

    #[test]
    fn bulk_members_are_spaced_by_member_delay() {
        let symbols: Vec<Symbol> = ["AAA", "BBB", "CCC"]
            .iter()
            .map(|s| Symbol::parse(s).unwrap())
            .collect();
        let pacer = RecordingPacer::default();
        let delay = Duration::from_secs(2);

        let resp = collect_members(&symbols, &pacer, delay, |symbol| {
            if symbol.as_str() == "BBB" {
                Err(DataError::EmptyResponse("no bars".into()))
            } else {
                Ok(vec![fixtures::bar(fixtures::date(2024, 1, 2), 1.0)])
            }
        })
        .unwrap();

        assert_eq!(pacer.taken(), vec![delay, delay]);
        let BulkResponse::Grouped(grouped) = resp else {
            panic!("expected a grouped response");
        };
        assert_eq!(grouped.len(), 2);
        assert!(!grouped.contains_key(&symbols[1]));
    }

    #[test]
    fn bulk_rate_limit_stops_remaining_members() {
        let symbols: Vec<Symbol> = ["AAA", "BBB", "CCC"]
            .iter()
            .map(|s| Symbol::parse(s).unwrap())
            .collect();
        let pacer = RecordingPacer::default();
        let mut seen = 0;

        let err = collect_members(&symbols, &pacer, Duration::from_secs(2), |_| {
            seen += 1;
            Err(DataError::RateLimited {
                retry_after_secs: None,
            })
        })
        .unwrap_err();

        assert!(matches!(err, DataError::RateLimited { .. }));
        assert_eq!(seen, 1);
        assert!(pacer.taken().is_empty());
    }

    #[test]
    fn chart_not_found_is_fatal() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(&aapl(), body).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn chart_without_bars_is_empty_response() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let err = parse_chart(&aapl(), body).unwrap_err();
        assert!(matches!(err, DataError::EmptyResponse(_)));
    }

    #[test]
    fn malformed_chart_is_format_change() {
        let err = parse_chart(&aapl(), "<html>").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn range_url_covers_whole_end_day() {
        let request = HistoryRequest::range(
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        let url = YahooProvider::chart_url(&aapl(), &request);
        assert!(url.contains("period1=1704931200"));
        assert!(url.contains("period2=1705363200"));
        assert!(url.contains("events=div%2Csplit"));

        let url = YahooProvider::chart_url(&aapl(), &HistoryRequest::period("max"));
        assert!(url.contains("range=max&interval=1d"));
    }

    const INCOME: &str = r#"{
        "quoteSummary": {
            "result": [{
                "incomeStatementHistory": {
                    "incomeStatementHistory": [
                        {
                            "maxAge": 1,
                            "endDate": {"raw": 1696032000, "fmt": "2023-09-30"},
                            "totalRevenue": {"raw": 383285000000, "fmt": "383.29B"},
                            "netIncome": {"raw": 96995000000, "fmt": "97B"}
                        },
                        {
                            "endDate": {"raw": 1664496000, "fmt": "2022-09-30"},
                            "netIncome": {"raw": 99803000000, "fmt": "99.8B"},
                            "researchDevelopment": {}
                        }
                    ]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn income_statement_by_period() {
        let Some(Table::Statement(s)) =
            parse_quote_summary(&aapl(), DatasetKind::Financials, INCOME).unwrap()
        else {
            panic!("expected statement");
        };
        assert_eq!(s.items.len(), 2);
        let d2023 = NaiveDate::from_ymd_opt(2023, 9, 30).unwrap();
        assert_eq!(s.items["totalRevenue"][&d2023], 383285000000.0);
        assert_eq!(s.periods().len(), 2);
    }

    #[test]
    fn earnings_is_net_income_by_period() {
        let Some(Table::Events(points)) =
            parse_quote_summary(&aapl(), DatasetKind::Earnings, INCOME).unwrap()
        else {
            panic!("expected events");
        };
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2022, 9, 30).unwrap());
        assert_eq!(points[1].value, 96995000000.0);
    }

    #[test]
    fn info_flattens_modules() {
        let body = r#"{"quoteSummary":{"result":[{
            "assetProfile": {"sector": "Technology", "fullTimeEmployees": 161000, "companyOfficers": [], "maxAge": 86400},
            "price": {"currency": "USD", "marketCap": {"raw": 2900000000000, "fmt": "2.9T"}}
        }],"error":null}}"#;
        let Some(Table::Snapshot(snapshot)) =
            parse_quote_summary(&aapl(), DatasetKind::Info, body).unwrap()
        else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.fields["sector"], "Technology");
        assert_eq!(snapshot.fields["fullTimeEmployees"], "161000");
        assert_eq!(snapshot.fields["marketCap"], "2900000000000");
        assert!(!snapshot.fields.contains_key("companyOfficers"));
        assert!(!snapshot.fields.contains_key("maxAge"));
    }

    #[test]
    fn missing_module_yields_none() {
        let body = r#"{"quoteSummary":{"result":[{}],"error":null}}"#;
        assert_eq!(
            parse_quote_summary(&aapl(), DatasetKind::Cashflow, body).unwrap(),
            None
        );
    }
}
