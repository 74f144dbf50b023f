//! End-to-end orchestration: load, normalize, filter, engineer, encode,
//! validate, train, persist.
//!
//! Stages run strictly in order because each one depends on the columns
//! the previous stage produced. Leakage is avoided by construction: raw
//! yields are filtered before any statistic is fitted, and the encoders
//! and scaler are fitted once on the full training frame that the folds
//! subset from.

use std::collections::BTreeMap;
use std::path::PathBuf;

use polars::prelude::{DataFrame, DataType};
use tracing::{info, warn};

use crate::artifacts::{ArtifactPaths, ArtifactStore, ModelBundle};
use crate::config::{DomainTables, PipelineConfig};
use crate::data::{load_dataset, resolve_dataset};
use crate::error::{AgriYieldError, Result};
use crate::preprocessing::{
    EngineeringSummary, FeatureEngineer, FeaturePipeline, FeatureSelector, OutlierFilter,
    OutlierSummary, SchemaNormalizer,
};
use crate::training::{
    CVSummary, ModelTrainer, RandomForestRegressor, Regressor, TrainedModel, TrainingReport,
    ValidationOrchestrator,
};

/// Everything a caller might want to show about a completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub data_path: PathBuf,
    pub rows_loaded: usize,
    pub outlier: OutlierSummary,
    pub engineering: EngineeringSummary,
    pub encoder_cardinalities: BTreeMap<String, usize>,
    pub temporal_cv: CVSummary,
    pub spatial_cv: CVSummary,
    pub report: TrainingReport,
    pub artifacts: ArtifactPaths,
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    tables: DomainTables,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            tables: DomainTables::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<PipelineRun> {
        self.config.validate()?;

        let data_path = resolve_dataset(&self.config.data_candidates)?;
        let raw = load_dataset(&data_path)?;
        let rows_loaded = raw.height();

        let normalizer = SchemaNormalizer::new(&self.tables.regions, &self.tables.seasons);
        let normalized = normalizer.normalize(&raw)?;

        let filter = OutlierFilter::new(&self.tables.crop_limits);
        let (filtered, outlier) = filter.apply(&normalized)?;
        if filtered.height() == 0 {
            return Err(AgriYieldError::DataError(
                "no rows survived outlier filtering".to_string(),
            ));
        }

        let mut engineer = FeatureEngineer::new(self.config.seed);
        let (engineered, engineering) = engineer.apply(&filtered)?;

        let mut pipeline = FeaturePipeline::new();
        let transformed = pipeline.fit_transform(&engineered)?;
        let x = FeatureSelector::matrix(&transformed)?;
        let y = FeatureSelector::target(&transformed)?;
        let feature_names = FeatureSelector::feature_names();
        let encoder_cardinalities = pipeline.encoder_cardinalities();

        let seed = self.config.seed;
        let orchestrator = ValidationOrchestrator::new(self.config.n_splits);

        let temporal_cv = match year_values(&transformed) {
            Some(years) => orchestrator.temporal_cv(&x, &y, &years, || validation_forest(seed))?,
            None => {
                warn!("year column missing, skipping temporal cross-validation");
                CVSummary::empty("temporal")
            }
        };
        let spatial_cv = match district_values(&transformed) {
            Some(districts) => {
                orchestrator.spatial_cv(&x, &y, &districts, || validation_forest(seed))?
            }
            None => {
                warn!("district column missing, skipping spatial cross-validation");
                CVSummary::empty("spatial")
            }
        };

        let trainer = ModelTrainer::new()
            .with_test_fraction(self.config.test_fraction)
            .with_seed(self.config.seed);
        let trained = trainer.train(&x, &y, &feature_names)?;

        let report = TrainingReport::new(
            &trained,
            &feature_names,
            &temporal_cv,
            &spatial_cv,
            engineer.seed(),
        );
        let TrainedModel { forest, .. } = trained;
        let bundle = ModelBundle::new(pipeline, forest, feature_names, engineer.seed());

        let store = ArtifactStore::new(&self.config.artifacts_dir);
        let artifacts = store.save(&bundle, &report)?;

        info!(
            rows = rows_loaded,
            retained = outlier.rows_retained,
            r2 = report.r2,
            "training pipeline complete"
        );
        Ok(PipelineRun {
            data_path,
            rows_loaded,
            outlier,
            engineering,
            encoder_cardinalities,
            temporal_cv,
            spatial_cv,
            report,
            artifacts,
        })
    }
}

/// Forest used inside cross-validation folds. Lighter than the production
/// forest so a five-fold run stays fast.
fn validation_forest(seed: u64) -> Box<dyn Regressor> {
    Box::new(
        RandomForestRegressor::new(100)
            .with_max_depth(15)
            .with_seed(seed),
    )
}

fn year_values(df: &DataFrame) -> Option<Vec<Option<i64>>> {
    let column = df.column("year").ok()?;
    let casted = column.cast(&DataType::Int64).ok()?;
    Some(casted.i64().ok()?.into_iter().collect())
}

fn district_values(df: &DataFrame) -> Option<Vec<Option<String>>> {
    let column = df.column("district").ok()?;
    let casted = column.cast(&DataType::String).ok()?;
    Some(
        casted
            .str()
            .ok()?
            .into_iter()
            .map(|opt| opt.map(|s| s.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_year_values_cast_from_any_numeric() {
        let df = df!(
            "year" => [2018i32, 2019, 2020],
            "district" => ["a", "b", "c"],
        )
        .unwrap();
        let years = year_values(&df).unwrap();
        assert_eq!(years, vec![Some(2018), Some(2019), Some(2020)]);
    }

    #[test]
    fn test_year_values_absent_column() {
        let df = df!("district" => ["a", "b"]).unwrap();
        assert!(year_values(&df).is_none());
    }

    #[test]
    fn test_district_values_preserve_nulls() {
        let df = df!(
            "district" => [Some("alwar"), None, Some("bhopal")],
        )
        .unwrap();
        let districts = district_values(&df).unwrap();
        assert_eq!(
            districts,
            vec![Some("alwar".to_string()), None, Some("bhopal".to_string())]
        );
    }
}
