//! Standard scaling for the continuous sensor and climate columns.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AgriYieldError, Result};
use crate::preprocessing::numeric_values;

/// Per-column moments captured at fit time.
///
/// The std is the population standard deviation; a constant column gets
/// std 1.0 so its scaled values are zeros instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMoments {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumericScaler {
    moments: BTreeMap<String, ColumnMoments>,
    is_fitted: bool,
}

impl NumericScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.moments.keys().map(String::as_str).collect()
    }

    pub fn moments(&self, column: &str) -> Option<&ColumnMoments> {
        self.moments.get(column)
    }

    /// Computes moments for each column. Missing values are treated as
    /// zero before the moments are taken.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.moments.clear();
        for column in columns {
            let filled = filled_values(df, column)?;
            self.moments
                .insert(column.to_string(), compute_moments(&filled));
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Fills missing values with zero in the raw columns and appends a
    /// standardized `{column}_scaled` column for each fitted column.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(AgriYieldError::NotFitted);
        }
        let mut df = df.clone();
        for (column, moments) in &self.moments {
            let filled = filled_values(&df, column)?;
            let scaled: Vec<f64> = filled
                .iter()
                .map(|v| (v - moments.mean) / moments.std)
                .collect();
            df.with_column(Series::new(column.as_str().into(), filled))?;
            df.with_column(Series::new(format!("{column}_scaled").into(), scaled))?;
        }
        Ok(df)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn filled_values(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
    Ok(numeric_values(df, column)?
        .into_iter()
        .map(|opt| opt.unwrap_or(0.0))
        .collect())
}

fn compute_moments(values: &[f64]) -> ColumnMoments {
    let n = values.len() as f64;
    if n == 0.0 {
        return ColumnMoments { mean: 0.0, std: 1.0 };
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    ColumnMoments {
        mean,
        std: if std == 0.0 { 1.0 } else { std },
    }
}
