//! Persistence for trained models.
//!
//! Everything needed to predict on new rows travels in one bundle: the
//! fitted encoders and scaler plus the forest. Loading the bundle and
//! calling [`ModelBundle::predict`] reproduces training-time features
//! exactly, so there is no skew between training and serving.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::preprocessing::{FeaturePipeline, FeatureSelector};
use crate::training::{RandomForestRegressor, TrainingReport};

pub const BUNDLE_VERSION: u32 = 1;

const MODEL_FILE: &str = "model.json";
const METRICS_FILE: &str = "metrics.json";
const IMPORTANCE_FILE: &str = "feature_importance.json";

/// A fitted feature pipeline and forest, serialized together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub bundle_version: u32,
    pub created_at: String,
    pub backfill_seed: u64,
    pub feature_names: Vec<String>,
    pub pipeline: FeaturePipeline,
    pub model: RandomForestRegressor,
}

impl ModelBundle {
    pub fn new(
        pipeline: FeaturePipeline,
        model: RandomForestRegressor,
        feature_names: Vec<String>,
        backfill_seed: u64,
    ) -> Self {
        Self {
            bundle_version: BUNDLE_VERSION,
            created_at: Utc::now().to_rfc3339(),
            backfill_seed,
            feature_names,
            pipeline,
            model,
        }
    }

    /// Encodes and scales engineered rows with the fitted pipeline, then
    /// predicts yields. Rows must carry the same raw columns training saw.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let transformed = self.pipeline.transform(df)?;
        let x = FeatureSelector::matrix(&transformed)?;
        self.model.predict(&x)
    }
}

/// Importances in rank order, for dashboards that only want the chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceReport {
    pub features: Vec<String>,
    pub importance: Vec<f64>,
}

impl FeatureImportanceReport {
    pub fn from_report(report: &TrainingReport) -> Self {
        let ranked = report.top_features(report.feature_importance.len());
        Self {
            features: ranked.iter().map(|(name, _)| name.clone()).collect(),
            importance: ranked.iter().map(|(_, weight)| *weight).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub metrics: PathBuf,
    pub feature_importance: PathBuf,
}

/// Writes and reads the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, bundle: &ModelBundle, report: &TrainingReport) -> Result<ArtifactPaths> {
        fs::create_dir_all(&self.dir)?;
        let paths = ArtifactPaths {
            model: self.dir.join(MODEL_FILE),
            metrics: self.dir.join(METRICS_FILE),
            feature_importance: self.dir.join(IMPORTANCE_FILE),
        };

        fs::write(&paths.model, serde_json::to_string_pretty(bundle)?)?;
        fs::write(&paths.metrics, serde_json::to_string_pretty(report)?)?;
        let importance = FeatureImportanceReport::from_report(report);
        fs::write(
            &paths.feature_importance,
            serde_json::to_string_pretty(&importance)?,
        )?;

        info!(dir = %self.dir.display(), "artifacts written");
        Ok(paths)
    }

    pub fn load_bundle(&self) -> Result<ModelBundle> {
        let raw = fs::read_to_string(self.dir.join(MODEL_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn load_report(&self) -> Result<TrainingReport> {
        let raw = fs::read_to_string(self.dir.join(METRICS_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
