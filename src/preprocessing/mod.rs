//! Preprocessing stages for raw crop yield datasets.
//!
//! Stages run in a fixed order: schema normalization, yield plausibility
//! filtering, feature engineering, then categorical encoding and numeric
//! scaling. Each stage consumes a DataFrame and produces a new one.

pub mod encoder;
pub mod features;
pub mod outlier;
pub mod pipeline;
pub mod scaler;
pub mod schema;

pub use encoder::CategoryEncoder;
pub use features::{EngineeringSummary, FeatureEngineer, FeatureSpec, DERIVED_FEATURES};
pub use outlier::{yield_conversion_factor, OutlierFilter, OutlierSummary};
pub use pipeline::{
    FeaturePipeline, FeatureSelector, ENCODED_COLUMNS, MODEL_FEATURES, SCALED_COLUMNS,
};
pub use scaler::NumericScaler;
pub use schema::SchemaNormalizer;

use polars::prelude::*;

use crate::error::{AgriYieldError, Result};

/// Extracts a column as nullable f64 values, casting numeric-like dtypes.
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df
        .column(name)
        .map_err(|_| AgriYieldError::MissingColumn(name.to_string()))?;
    let casted = col.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Extracts a column as nullable strings, casting non-string dtypes.
pub(crate) fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .map_err(|_| AgriYieldError::MissingColumn(name.to_string()))?;
    let casted = col.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|opt| opt.map(str::to_string))
        .collect())
}
