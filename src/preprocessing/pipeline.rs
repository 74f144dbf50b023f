//! Fitted preprocessing state and the model feature contract.
//!
//! [`FeaturePipeline`] owns the encoders and scaler learned during
//! training; it ships inside the model bundle so inference re-applies the
//! exact same transforms. [`FeatureSelector`] projects a transformed frame
//! onto the fixed feature matrix the model was trained on.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AgriYieldError, Result};
use crate::preprocessing::{numeric_values, CategoryEncoder, NumericScaler};

/// Categorical columns encoded during preprocessing.
pub const ENCODED_COLUMNS: [&str; 6] = ["state", "district", "crop", "season", "region", "soil_type"];

/// Continuous columns standardized during preprocessing.
pub const SCALED_COLUMNS: [&str; 6] = [
    "rainfall",
    "ndvi",
    "soil_moisture",
    "lst",
    "temperature",
    "humidity",
];

/// The model input columns, in the order the matrix is assembled.
///
/// This list is part of the persisted bundle: a model trained against it
/// can only be fed matrices built from the same names in the same order.
/// The region encoding is learned and shipped for downstream consumers but
/// deliberately kept out of the model inputs.
pub const MODEL_FEATURES: [&str; 11] = [
    "state_encoded",
    "district_encoded",
    "crop_encoded",
    "season_encoded",
    "soil_type_encoded",
    "rainfall_scaled",
    "temperature_scaled",
    "humidity_scaled",
    "ndvi_scaled",
    "soil_moisture_scaled",
    "lst_scaled",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePipeline {
    encoders: BTreeMap<String, CategoryEncoder>,
    scaler: NumericScaler,
    is_fitted: bool,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits one encoder per categorical column and the scaler over the
    /// continuous columns present, returning the transformed frame.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        self.encoders.clear();
        for column in ENCODED_COLUMNS {
            if df.column(column).is_err() {
                return Err(AgriYieldError::MissingColumn(column.to_string()));
            }
            let mut encoder = CategoryEncoder::new(column);
            let encoded = encoder.fit_transform(&df)?;
            df.with_column(encoded)?;
            self.encoders.insert(column.to_string(), encoder);
        }

        let scale_columns: Vec<&str> = SCALED_COLUMNS
            .iter()
            .copied()
            .filter(|c| df.column(c).is_ok())
            .collect();
        df = self.scaler.fit_transform(&df, &scale_columns)?;
        self.is_fitted = true;

        info!(
            encoded = self.encoders.len(),
            scaled = scale_columns.len(),
            "feature pipeline fitted"
        );
        Ok(df)
    }

    /// Re-applies the fitted transforms to a new frame. Unseen categorical
    /// values are an error.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(AgriYieldError::NotFitted);
        }
        let mut df = df.clone();
        for encoder in self.encoders.values() {
            let encoded = encoder.transform(&df)?;
            df.with_column(encoded)?;
        }
        self.scaler.transform(&df)
    }

    pub fn encoder(&self, column: &str) -> Option<&CategoryEncoder> {
        self.encoders.get(column)
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }

    /// Distinct category count per encoded column.
    pub fn encoder_cardinalities(&self) -> BTreeMap<String, usize> {
        self.encoders
            .iter()
            .map(|(name, enc)| (name.clone(), enc.cardinality()))
            .collect()
    }
}

/// Projects a transformed frame onto the fixed model inputs.
pub struct FeatureSelector;

impl FeatureSelector {
    pub fn feature_names() -> Vec<String> {
        MODEL_FEATURES.iter().map(|s| s.to_string()).collect()
    }

    /// Builds the model input matrix. Every contract column must exist; a
    /// missing one means the dataset cannot satisfy the trained interface.
    pub fn matrix(df: &DataFrame) -> Result<Array2<f64>> {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(MODEL_FEATURES.len());
        for name in MODEL_FEATURES {
            let values = numeric_values(df, name)?
                .into_iter()
                .map(|opt| opt.unwrap_or(0.0))
                .collect();
            columns.push(values);
        }
        let n_rows = df.height();
        Ok(Array2::from_shape_fn(
            (n_rows, MODEL_FEATURES.len()),
            |(row, col)| columns[col][row],
        ))
    }

    /// Extracts the target vector.
    pub fn target(df: &DataFrame) -> Result<Array1<f64>> {
        let values: Vec<f64> = numeric_values(df, "yield")?
            .into_iter()
            .map(|opt| opt.unwrap_or(0.0))
            .collect();
        Ok(Array1::from_vec(values))
    }
}
