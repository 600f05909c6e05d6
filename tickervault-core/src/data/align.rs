//! Multi-symbol time alignment.
//!
//! Given one dated series per symbol, align them to the union of their
//! dates. Gaps stay `None` unless a fill method is requested.

use super::provider::DataError;
use crate::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

/// How to fill gaps on the common axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    #[default]
    None,
    /// Carry the last known value forward.
    Forward,
    /// Carry the next known value backward.
    Backward,
}

impl FromStr for Fill {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Fill::None),
            "ffill" | "forward" => Ok(Fill::Forward),
            "bfill" | "backward" => Ok(Fill::Backward),
            other => Err(DataError::ValidationError(format!(
                "unknown fill method '{other}' (valid: none, ffill, bfill)"
            ))),
        }
    }
}

/// Series for several symbols on one shared date axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedSeries {
    /// The common date axis (sorted ascending).
    pub dates: Vec<NaiveDate>,
    /// One column per symbol, each as long as `dates`.
    pub columns: BTreeMap<Symbol, Vec<Option<f64>>>,
}

/// Align per-symbol series onto the union of their dates.
pub fn align_series(series: &BTreeMap<Symbol, Vec<(NaiveDate, f64)>>, fill: Fill) -> AlignedSeries {
    let all_dates: BTreeSet<NaiveDate> = series
        .values()
        .flat_map(|points| points.iter().map(|(date, _)| *date))
        .collect();
    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    let mut columns = BTreeMap::new();
    for (symbol, points) in series {
        let by_date: HashMap<NaiveDate, f64> = points.iter().copied().collect();
        let mut column: Vec<Option<f64>> = dates.iter().map(|d| by_date.get(d).copied()).collect();
        apply_fill(&mut column, fill);
        columns.insert(symbol.clone(), column);
    }

    AlignedSeries { dates, columns }
}

fn apply_fill(column: &mut [Option<f64>], fill: Fill) {
    let mut carry = None;
    match fill {
        Fill::None => {}
        Fill::Forward => {
            for cell in column.iter_mut() {
                match *cell {
                    Some(v) => carry = Some(v),
                    None => *cell = carry,
                }
            }
        }
        Fill::Backward => {
            for cell in column.iter_mut().rev() {
                match *cell {
                    Some(v) => carry = Some(v),
                    None => *cell = carry,
                }
            }
        }
    }
}
