//! TickerVault CLI: fetch, update, config, tickers and load commands.
//!
//! Commands:
//! - `fetch`: download history and auxiliary tables into the parquet store
//! - `update`: extend stored price history up to today
//! - `config`: show or edit the TOML configuration file
//! - `tickers`: manage the `tickers.txt` list in the data directory
//! - `load`: list and summarize what is stored

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tickervault_core::data::loader::{self, SymbolSummary};
use tickervault_core::data::{
    DatasetKind, FetchOptions, Fetcher, HistoryRequest, ParquetStore, StdoutProgress, Table,
    ThreadPacer, UpdateReport, Updater, YahooProvider,
};
use tickervault_core::symbol::{load_ticker_file, save_ticker_file, validate_symbols, TICKER_FILE};
use tickervault_core::{AppConfig, Symbol};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tickervault",
    version,
    about = "TickerVault CLI: rate-limit-aware Yahoo Finance fetching into a local parquet store"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (overrides the config file).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArg {
    /// Path to the config file. Defaults to ~/.tickervault.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ConfigArg {
    fn path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(AppConfig::default_path)
    }

    fn load(&self) -> Result<(AppConfig, PathBuf)> {
        let path = self.path();
        let config = AppConfig::load_or_init(&path)
            .with_context(|| format!("loading config {}", path.display()))?;
        Ok((config, path))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch data for tickers and save it to parquet files.
    Fetch {
        /// Ticker symbols to fetch (defaults to the configured list).
        #[arg(long, num_args = 1..)]
        tickers: Vec<String>,

        /// Read tickers from this file, one per line.
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Period to fetch (1d 5d 1mo 3mo 6mo 1y 2y 5y 10y ytd max).
        #[arg(long)]
        period: Option<String>,

        /// Bar interval (1d 5d 1wk 1mo 3mo).
        #[arg(long)]
        interval: Option<String>,

        /// Data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Symbols per bulk request.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Symbols per daily chunk.
        #[arg(long)]
        daily_limit: Option<usize>,

        /// Attempts per request.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Ignore fresh stored data and fetch everything.
        #[arg(long, default_value_t = false)]
        force_refresh: bool,

        #[command(flatten)]
        config: ConfigArg,
    },
    /// Update stored price history with the latest bars.
    Update {
        /// Ticker symbols to update (defaults to the configured list).
        #[arg(long, num_args = 1..)]
        tickers: Vec<String>,

        /// Read tickers from tickers.txt in the data directory.
        #[arg(long, default_value_t = false)]
        from_file: bool,

        /// Bar interval (1d 5d 1wk 1mo 3mo).
        #[arg(long)]
        interval: Option<String>,

        /// Data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArg,
    },
    /// View or modify the configuration.
    Config {
        /// Print the current configuration.
        #[arg(long, default_value_t = false)]
        show: bool,

        /// Set a configuration key, e.g. `--set fetch.batch_size 25`.
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
        set: Vec<String>,

        #[command(flatten)]
        config: ConfigArg,
    },
    /// Manage the tickers.txt list.
    Tickers {
        /// Save these tickers to tickers.txt.
        #[arg(long, num_args = 1.., value_name = "TICKER")]
        save: Vec<String>,

        /// Print the tickers in tickers.txt.
        #[arg(long, default_value_t = false)]
        load: bool,

        /// Replace the configured ticker list with tickers.txt.
        #[arg(long, default_value_t = false)]
        update_config: bool,

        /// Data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArg,
    },
    /// Inspect stored data.
    Load {
        /// List symbols with stored data.
        #[arg(long, default_value_t = false)]
        list_tickers: bool,

        /// Summarize stored data per symbol.
        #[arg(long, default_value_t = false)]
        summary: bool,

        /// Show stored kinds and recent rows for one ticker.
        #[arg(long, value_name = "TICKER")]
        ticker_info: Option<String>,

        /// Write the summary here instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format for --output.
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level;

    match cli.command {
        Commands::Fetch {
            tickers,
            from_file,
            period,
            interval,
            data_dir,
            batch_size,
            daily_limit,
            max_retries,
            force_refresh,
            config,
        } => {
            let (mut app, _) = config.load()?;
            if let Some(dir) = data_dir {
                app.data_dir = dir;
            }
            if let Some(p) = period {
                app.period = p;
            }
            if let Some(i) = interval {
                app.interval = i;
            }
            if let Some(n) = batch_size {
                app.fetch.batch_size = n;
            }
            if let Some(n) = daily_limit {
                app.fetch.daily_limit = n;
            }
            if let Some(n) = max_retries {
                app.fetch.max_retries = n;
            }
            app.validate()?;
            init_logging(log_level.as_deref(), &app.log_level);

            let tickers = match from_file {
                Some(path) => read_ticker_file(&path)?,
                None if !tickers.is_empty() => tickers,
                None => app.tickers.clone(),
            };
            run_fetch(&app, &tickers, force_refresh)
        }
        Commands::Update {
            tickers,
            from_file,
            interval,
            data_dir,
            config,
        } => {
            let (mut app, _) = config.load()?;
            if let Some(dir) = data_dir {
                app.data_dir = dir;
            }
            if let Some(i) = interval {
                app.interval = i;
            }
            app.validate()?;
            init_logging(log_level.as_deref(), &app.log_level);

            let tickers = if from_file {
                read_ticker_file(&app.data_dir.join(TICKER_FILE))?
            } else if !tickers.is_empty() {
                tickers
            } else {
                app.tickers.clone()
            };
            run_update(&app, &tickers)
        }
        Commands::Config { show, set, config } => {
            let (mut app, path) = config.load()?;
            init_logging(log_level.as_deref(), &app.log_level);
            run_config(&mut app, &path, show, &set)
        }
        Commands::Tickers {
            save,
            load,
            update_config,
            data_dir,
            config,
        } => {
            let (mut app, path) = config.load()?;
            init_logging(log_level.as_deref(), &app.log_level);
            let data_dir = data_dir.unwrap_or_else(|| app.data_dir.clone());
            run_tickers(&mut app, &path, &data_dir, &save, load, update_config)
        }
        Commands::Load {
            list_tickers,
            summary,
            ticker_info,
            output,
            format,
            data_dir,
            config,
        } => {
            let (app, _) = config.load()?;
            init_logging(log_level.as_deref(), &app.log_level);
            let store = ParquetStore::new(data_dir.unwrap_or_else(|| app.data_dir.clone()));
            if list_tickers {
                run_list_tickers(&store)
            } else if summary {
                run_summary(&store, output.as_deref(), format)
            } else if let Some(ticker) = ticker_info {
                run_ticker_info(&store, &ticker)
            } else {
                eprintln!("Please specify an action (--summary, --list-tickers, or --ticker-info)");
                std::process::exit(1);
            }
        }
    }
}

/// `RUST_LOG` wins, then `--log-level`, then the config file.
fn init_logging(cli_level: Option<&str>, config_level: &str) {
    let fallback = cli_level.unwrap_or(config_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn read_ticker_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        bail!("ticker file not found: {}", path.display());
    }
    let symbols = load_ticker_file(path)?;
    if symbols.is_empty() {
        bail!("no tickers found in {}", path.display());
    }
    Ok(symbols.into_iter().map(|s| s.to_string()).collect())
}

fn run_fetch(app: &AppConfig, tickers: &[String], force_refresh: bool) -> Result<()> {
    let store = ParquetStore::new(&app.data_dir);
    let provider = YahooProvider::new()?.with_member_delay(app.fetch.request_delay);
    let pacer = ThreadPacer;
    let progress = StdoutProgress;
    let fetcher =
        Fetcher::new(&provider, Some(&store), &app.fetch, &pacer).with_progress(&progress);

    let request = HistoryRequest::period(app.period.as_str()).with_interval(app.interval.as_str());
    let options = FetchOptions {
        force_refresh,
        ..FetchOptions::default()
    };
    tracing::info!(tickers = tickers.len(), data_dir = %app.data_dir.display(), "fetching");
    let report = fetcher.fetch_symbols(tickers, &request, &options)?;

    for raw in &report.rejected {
        eprintln!("Rejected invalid ticker: {raw}");
    }
    if report.succeeded() == 0 {
        tracing::error!("no data fetched");
        std::process::exit(1);
    }
    tracing::info!(
        "successfully processed {}/{} tickers",
        report.succeeded(),
        tickers.len()
    );
    Ok(())
}

fn run_update(app: &AppConfig, tickers: &[String]) -> Result<()> {
    for raw in rejected_tickers(tickers) {
        eprintln!("Rejected invalid ticker: {raw}");
    }
    let symbols = validate_symbols(tickers);
    let store = ParquetStore::new(&app.data_dir);
    let provider = YahooProvider::new()?.with_member_delay(app.fetch.request_delay);
    let pacer = ThreadPacer;
    let updater = Updater::new(&provider, &store, &app.fetch, &pacer);

    tracing::info!(tickers = symbols.len(), "updating");
    let report = updater.update_symbols(&symbols, None, &app.interval);

    if !all_updated(&symbols, &report) {
        tracing::warn!("updated {}/{} tickers", report.succeeded(), symbols.len());
        for symbol in report.failed_symbols() {
            eprintln!("Update failed: {symbol}");
        }
        std::process::exit(1);
    }
    tracing::info!("all {} tickers updated successfully", symbols.len());
    Ok(())
}

/// Raw inputs that are not valid ticker symbols.
fn rejected_tickers(tickers: &[String]) -> Vec<&str> {
    tickers
        .iter()
        .map(String::as_str)
        .filter(|raw| Symbol::parse(raw).is_err())
        .collect()
}

/// Whether every validated symbol was updated.
fn all_updated(symbols: &[Symbol], report: &UpdateReport) -> bool {
    symbols.iter().all(|s| report.results.get(s) == Some(&true))
}

fn run_config(app: &mut AppConfig, path: &Path, show: bool, set: &[String]) -> Result<()> {
    if show {
        print!("{}", app.to_toml()?);
    }
    if set.is_empty() {
        return Ok(());
    }
    for pair in set.chunks(2) {
        let [key, value] = pair else {
            bail!("--set takes a KEY and a VALUE");
        };
        app.set(key, value).with_context(|| format!("setting {key}"))?;
        println!("Set {key} = {value}");
    }
    app.save(path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn run_tickers(
    app: &mut AppConfig,
    config_path: &Path,
    data_dir: &Path,
    save: &[String],
    load: bool,
    update_config: bool,
) -> Result<()> {
    let list_path = data_dir.join(TICKER_FILE);
    if !save.is_empty() {
        let count = save_ticker_file(save, data_dir)?;
        println!("Saved {count} tickers to {}", list_path.display());
    }
    if !(load || update_config) {
        return Ok(());
    }

    let symbols = if list_path.exists() {
        load_ticker_file(&list_path)?
    } else {
        Vec::new()
    };
    if symbols.is_empty() {
        println!("No tickers found in {}", list_path.display());
        std::process::exit(1);
    }
    if load {
        println!("Tickers:");
        for symbol in &symbols {
            println!("  {symbol}");
        }
    }
    if update_config {
        app.tickers = symbols.iter().map(Symbol::to_string).collect();
        app.save(config_path)?;
        println!("Updated configuration with {} tickers from file", symbols.len());
    }
    Ok(())
}

fn run_list_tickers(store: &ParquetStore) -> Result<()> {
    let symbols = loader::available_tickers(store)?;
    if symbols.is_empty() {
        println!("No tickers found in {}", store.data_dir().display());
        return Ok(());
    }
    println!("Found {} tickers in {}:", symbols.len(), store.data_dir().display());
    for symbol in &symbols {
        println!("  {symbol}");
    }
    Ok(())
}

fn run_summary(store: &ParquetStore, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let rows = loader::data_summary(store)?;
    if rows.is_empty() {
        println!("No data found in {}", store.data_dir().display());
        std::process::exit(1);
    }

    let Some(path) = output else {
        print_summary(&rows);
        return Ok(());
    };
    match format {
        OutputFormat::Csv => write_summary_csv(&rows, path)?,
        OutputFormat::Json => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(file, &rows)?;
        }
    }
    println!("Data summary saved to {}", path.display());
    Ok(())
}

fn write_summary_csv(rows: &[SymbolSummary], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["symbol", "kinds", "ohlcv_rows", "first_date", "last_date"])?;
    for row in rows {
        writer.write_record([
            row.symbol.to_string(),
            kind_list(&row.kinds),
            row.ohlcv_rows.map(|n| n.to_string()).unwrap_or_default(),
            row.first_date.map(|d| d.to_string()).unwrap_or_default(),
            row.last_date.map(|d| d.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn kind_list(kinds: &[DatasetKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn print_summary(rows: &[SymbolSummary]) {
    println!(
        "{:<10} {:>8} {:<12} {:<12} Kinds",
        "Symbol", "Rows", "First", "Last"
    );
    println!("{}", "-".repeat(72));
    for row in rows {
        println!(
            "{:<10} {:>8} {:<12} {:<12} {}",
            row.symbol,
            row.ohlcv_rows.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            row.first_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            row.last_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            kind_list(&row.kinds),
        );
    }
}

fn run_ticker_info(store: &ParquetStore, ticker: &str) -> Result<()> {
    let symbol = Symbol::parse(ticker)?;
    let kinds = store.available_kinds(&symbol);
    if kinds.is_empty() {
        println!("Ticker {symbol} not found in {}", store.data_dir().display());
        std::process::exit(1);
    }

    println!("Data available for {symbol}:");
    for kind in &kinds {
        println!("  - {kind}");
    }

    if kinds.contains(&DatasetKind::Ohlcv) {
        let bars = loader::load_history(store, &symbol, None, None)?;
        println!("\nMost recent OHLCV data:");
        println!(
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>14}",
            "Date", "Open", "High", "Low", "Close", "Volume"
        );
        for bar in &bars[bars.len().saturating_sub(5)..] {
            println!(
                "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14}",
                bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
            );
        }
    }

    if kinds.contains(&DatasetKind::Financials) {
        let statement = loader::load_statement(store, &symbol, DatasetKind::Financials, None)?;
        if let Some(statement) = statement {
            let latest = statement.periods().last().copied();
            let label = latest.map(|d| d.to_string()).unwrap_or_default();
            println!("\nMost recent financial data ({label}):");
            for (item, row) in statement.items.iter().take(5) {
                match latest.and_then(|d| row.get(&d)) {
                    Some(v) => println!("  {item:<40} {v:>18.0}"),
                    None => println!("  {item:<40} {:>18}", "-"),
                }
            }
        }
    }

    if let Some(info) = loader::load_info(store, &symbol) {
        for key in ["longName", "sector", "industry", "currency"] {
            if let Some(value) = info.fields.get(key) {
                println!("{key}: {value}");
            }
        }
    }

    if let Some(Table::Events(points)) = store.load_kind(&symbol, DatasetKind::Dividends) {
        println!("\nDividend events stored: {}", points.len());
    }
    Ok(())
}
