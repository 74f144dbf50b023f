//! Yield plausibility filtering.
//!
//! Datasets report yield in either kg/ha or tonnes/ha. The filter first
//! normalizes units, then drops rows whose yield is missing, non-positive,
//! or outside the plausible range for the row's crop.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CropYieldLimits;
use crate::error::Result;
use crate::preprocessing::{numeric_values, string_values};

/// Unit conversion policy for the yield column.
///
/// A dataset-wide median below 100 indicates tonnes/ha; those values are
/// scaled by 1000 to kg/ha. Anything else is taken as kg/ha already.
pub fn yield_conversion_factor(yields: &[f64]) -> f64 {
    if yields.is_empty() {
        return 1.0;
    }
    let mut sorted = yields.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    if median < 100.0 {
        1000.0
    } else {
        1.0
    }
}

/// Row counts and the conversion factor applied during filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub rows_before: usize,
    pub rows_removed: usize,
    pub rows_retained: usize,
    pub conversion_factor: f64,
}

pub struct OutlierFilter<'a> {
    limits: &'a CropYieldLimits,
}

impl<'a> OutlierFilter<'a> {
    pub fn new(limits: &'a CropYieldLimits) -> Self {
        Self { limits }
    }

    /// Converts yields to kg/ha and removes implausible rows, preserving
    /// the order of retained rows.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, OutlierSummary)> {
        let raw = numeric_values(df, "yield")?;
        let present: Vec<f64> = raw.iter().flatten().copied().collect();
        let factor = yield_conversion_factor(&present);

        let converted: Vec<Option<f64>> = raw.iter().map(|opt| opt.map(|v| v * factor)).collect();
        let mut df = df.clone();
        df.with_column(Series::new("yield".into(), converted.clone()))?;

        let crops = if df.column("crop").is_ok() {
            Some(string_values(&df, "crop")?)
        } else {
            None
        };

        let mask: Vec<bool> = converted
            .iter()
            .enumerate()
            .map(|(i, value)| match value {
                Some(y) if *y > 0.0 => {
                    let (lo, hi) = match &crops {
                        Some(crops) => self
                            .limits
                            .bounds_for(crops[i].as_deref().unwrap_or("unknown")),
                        None => self.limits.default_bounds(),
                    };
                    *y >= lo && *y <= hi
                }
                _ => false,
            })
            .collect();

        let mask = BooleanChunked::from_slice("retain".into(), &mask);
        let filtered = df.filter(&mask)?;

        let summary = OutlierSummary {
            rows_before: df.height(),
            rows_removed: df.height() - filtered.height(),
            rows_retained: filtered.height(),
            conversion_factor: factor,
        };
        info!(
            removed = summary.rows_removed,
            retained = summary.rows_retained,
            factor = summary.conversion_factor,
            "filtered implausible yields"
        );
        Ok((filtered, summary))
    }
}
