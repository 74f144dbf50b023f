//! Label encoding for categorical columns.
//!
//! Codes are assigned by sort rank of the distinct values seen at fit, so
//! the mapping is reproducible across runs regardless of row order. The
//! sorted class list doubles as the lookup table: encoding is a binary
//! search and decoding is an index.

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AgriYieldError, Result};
use crate::preprocessing::string_values;

/// Value used for missing entries, matching the schema normalizer's fill.
const MISSING: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    column: String,
    classes: Vec<String>,
    is_fitted: bool,
}

impl CategoryEncoder {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Name of the integer column this encoder produces.
    pub fn output_name(&self) -> String {
        format!("{}_encoded", self.column)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn cardinality(&self) -> usize {
        self.classes.len()
    }

    /// Learns the distinct values of the column. Missing entries count as
    /// the "unknown" category.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let values = string_values(df, &self.column)?;
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|opt| opt.unwrap_or_else(|| MISSING.to_string()))
            .collect();
        self.classes = distinct.into_iter().collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Encodes the column into `{column}_encoded`. A value never seen at
    /// fit is an error so stale bundles cannot silently mis-encode.
    pub fn transform(&self, df: &DataFrame) -> Result<Series> {
        if !self.is_fitted {
            return Err(AgriYieldError::NotFitted);
        }
        let values = string_values(df, &self.column)?;
        let mut codes: Vec<i64> = Vec::with_capacity(values.len());
        for opt in values {
            let value = opt.unwrap_or_else(|| MISSING.to_string());
            codes.push(self.code_of(&value)?);
        }
        Ok(Series::new(self.output_name().into(), codes))
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Series> {
        self.fit(df)?;
        self.transform(df)
    }

    pub fn code_of(&self, value: &str) -> Result<i64> {
        if !self.is_fitted {
            return Err(AgriYieldError::NotFitted);
        }
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map(|idx| idx as i64)
            .map_err(|_| AgriYieldError::UnknownCategory {
                column: self.column.clone(),
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: i64) -> Result<&str> {
        if !self.is_fitted {
            return Err(AgriYieldError::NotFitted);
        }
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
            .ok_or_else(|| AgriYieldError::DataError(format!(
                "code {} out of range for column '{}'",
                code, self.column
            )))
    }
}
