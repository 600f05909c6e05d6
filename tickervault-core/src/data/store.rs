//! Per-symbol parquet store.
//!
//! Layout: `{data_dir}/{SYMBOL}/{kind}.parquet`, plus a `meta.json` sidecar
//! per symbol directory.
//!
//! - Atomic writes (write to `.tmp`, rename into place)
//! - Integrity validation on load (expected columns, row count > 0)
//! - Quarantine for corrupt files on `load` (`{kind}.parquet.quarantined`);
//!   date lookups never move files
//!
//! The store assumes a single writer per data directory.

use super::codec::{frame_to_table, table_to_frame};
use super::kind::DatasetKind;
use super::provider::DataError;
use super::table::{Table, TickerData};
use crate::symbol::Symbol;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";

/// Sidecar entry for one stored kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindMeta {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub data_hash: String,
    pub written_at: NaiveDateTime,
}

/// Metadata sidecar for a stored symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbol: String,
    pub kinds: BTreeMap<DatasetKind, KindMeta>,
}

/// The parquet store.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    data_dir: PathBuf,
}

impl ParquetStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn symbol_dir(&self, symbol: &Symbol) -> PathBuf {
        self.data_dir.join(symbol.as_str())
    }

    fn kind_path(&self, symbol: &Symbol, kind: DatasetKind) -> PathBuf {
        self.symbol_dir(symbol).join(kind.file_name())
    }

    fn meta_path(&self, symbol: &Symbol) -> PathBuf {
        self.symbol_dir(symbol).join(META_FILE)
    }

    /// Whether a directory exists for the symbol, regardless of contents.
    pub fn has_symbol(&self, symbol: &Symbol) -> bool {
        self.symbol_dir(symbol).is_dir()
    }

    /// Persist one table, replacing any previous file for the kind.
    pub fn save(&self, symbol: &Symbol, kind: DatasetKind, table: &Table) -> Result<(), DataError> {
        if table.is_empty() {
            return Err(DataError::StoreError(format!(
                "refusing to store empty {kind} table for {symbol}"
            )));
        }
        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let df = table_to_frame(kind, table)?;
        let path = self.kind_path(symbol, kind);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        let (first_date, last_date) = match table.date_range() {
            Some((first, last)) => (Some(first), Some(last)),
            None => (None, None),
        };
        let mut meta = self.get_meta(symbol).unwrap_or_else(|| StoreMeta {
            symbol: symbol.to_string(),
            kinds: BTreeMap::new(),
        });
        meta.kinds.insert(
            kind,
            KindMeta {
                rows: table.row_count(),
                first_date,
                last_date,
                data_hash: table.content_hash(),
                written_at: chrono::Local::now().naive_local(),
            },
        );
        self.write_meta(symbol, &meta)?;

        tracing::debug!(symbol = %symbol, kind = %kind, rows = table.row_count(), "stored table");
        Ok(())
    }

    /// Persist every non-empty table; returns how many were written.
    pub fn save_all(&self, symbol: &Symbol, data: &TickerData) -> Result<usize, DataError> {
        let mut written = 0;
        for (kind, table) in data {
            if table.is_empty() {
                continue;
            }
            self.save(symbol, *kind, table)?;
            written += 1;
        }
        Ok(written)
    }

    /// Load the requested kinds (all kinds when `None`).
    ///
    /// Kinds without a file, and corrupt files, are simply absent from the
    /// result. A symbol with no directory yields an empty map.
    pub fn load(
        &self,
        symbol: &Symbol,
        kinds: Option<&[DatasetKind]>,
    ) -> Result<TickerData, DataError> {
        let mut out = TickerData::new();
        if !self.has_symbol(symbol) {
            return Ok(out);
        }
        let wanted = kinds.unwrap_or(&DatasetKind::ALL);
        for kind in wanted {
            if let Some(table) = self.load_kind(symbol, *kind) {
                out.insert(*kind, table);
            }
        }
        Ok(out)
    }

    /// Load one kind, quarantining the file if it fails to decode.
    ///
    /// A file that cannot be opened is left in place and reported absent.
    pub fn load_kind(&self, symbol: &Symbol, kind: DatasetKind) -> Option<Table> {
        let path = self.kind_path(symbol, kind);
        if !path.is_file() {
            return None;
        }
        match read_table(&path, kind) {
            Ok(table) => Some(table),
            Err(ReadFailure::Open(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open store file");
                None
            }
            Err(ReadFailure::Corrupt(e)) => {
                let quarantine = path.with_extension("parquet.quarantined");
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "quarantining corrupt store file"
                );
                let _ = fs::rename(&path, &quarantine);
                None
            }
        }
    }

    /// Read one kind without side effects: unreadable files stay where they are.
    pub fn peek_kind(&self, symbol: &Symbol, kind: DatasetKind) -> Option<Table> {
        let path = self.kind_path(symbol, kind);
        if !path.is_file() {
            return None;
        }
        match read_table(&path, kind) {
            Ok(table) => Some(table),
            Err(ReadFailure::Open(e)) => {
                tracing::debug!(path = %path.display(), error = %e, "store file not readable");
                None
            }
            Err(ReadFailure::Corrupt(e)) => {
                tracing::debug!(path = %path.display(), error = %e, "store file does not decode");
                None
            }
        }
    }

    /// Maximum index date of a stored date-indexed kind. Read-only.
    pub fn latest_date(&self, symbol: &Symbol, kind: DatasetKind) -> Option<NaiveDate> {
        if !kind.is_date_indexed() {
            return None;
        }
        self.peek_kind(symbol, kind)?.latest_date()
    }

    /// Minimum index date of a stored date-indexed kind. Read-only.
    pub fn earliest_date(&self, symbol: &Symbol, kind: DatasetKind) -> Option<NaiveDate> {
        if !kind.is_date_indexed() {
            return None;
        }
        self.peek_kind(symbol, kind)?
            .date_range()
            .map(|(first, _)| first)
    }

    /// Kinds with a parquet file on disk for the symbol.
    pub fn available_kinds(&self, symbol: &Symbol) -> Vec<DatasetKind> {
        DatasetKind::ALL
            .into_iter()
            .filter(|kind| self.kind_path(symbol, *kind).is_file())
            .collect()
    }

    /// Sorted symbols with at least one persisted kind.
    ///
    /// Directories whose names are not valid symbols are ignored.
    pub fn list_symbols(&self) -> Result<Vec<Symbol>, DataError> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.data_dir)
            .map_err(|e| DataError::StoreError(format!("read dir: {e}")))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::StoreError(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(symbol) = Symbol::parse(&name) else {
                continue;
            };
            if symbol.as_str() == name && !self.available_kinds(&symbol).is_empty() {
                symbols.push(symbol);
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// Sidecar metadata, if present and readable.
    pub fn get_meta(&self, symbol: &Symbol) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_meta(&self, symbol: &Symbol, meta: &StoreMeta) -> Result<(), DataError> {
        let json = serde_json::to_string_pretty(meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))
    }
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Why a stored file could not be turned into a table.
enum ReadFailure {
    /// Opening failed; the contents are unknown.
    Open(std::io::Error),
    /// The file opened but is not a valid table of its kind.
    Corrupt(DataError),
}

fn read_table(path: &Path, kind: DatasetKind) -> Result<Table, ReadFailure> {
    let file = fs::File::open(path).map_err(ReadFailure::Open)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| ReadFailure::Corrupt(DataError::ParquetError(format!("read: {e}"))))?;
    frame_to_table(kind, &df).map_err(ReadFailure::Corrupt)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    pub fn temp_data_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("tickervault_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
