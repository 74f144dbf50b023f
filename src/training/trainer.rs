//! Holdout training of the production forest, scored against cheap
//! baselines so a regression in the forest shows up immediately.

use std::collections::BTreeMap;

use chrono::Utc;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AgriYieldError, Result};
use crate::training::metrics::RegressionMetrics;
use crate::training::random_forest::{ForestParams, MaxFeatures, RandomForestRegressor};
use crate::training::validation::{CVSummary, FoldMetrics};
use crate::training::{LinearRegression, Regressor};

const MIN_TRAINING_ROWS: usize = 10;

/// Holdout metrics for one baseline estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineScore {
    pub model: String,
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

/// The fitted production forest plus everything measured while fitting it.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub forest: RandomForestRegressor,
    pub holdout: RegressionMetrics,
    pub oob_score: Option<f64>,
    pub feature_importance: BTreeMap<String, f64>,
    pub baselines: Vec<BaselineScore>,
    pub n_train: usize,
    pub n_test: usize,
}

/// Splits off a shuffled holdout set, scores the baselines on it, then
/// fits the production forest.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    test_fraction: f64,
    seed: u64,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer {
    pub fn new() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn train(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<TrainedModel> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if n_samples < MIN_TRAINING_ROWS {
            return Err(AgriYieldError::TrainingError(format!(
                "need at least {} rows after preprocessing, got {}",
                MIN_TRAINING_ROWS, n_samples
            )));
        }

        let (train_indices, test_indices) = self.split_indices(n_samples);
        let x_train = x.select(Axis(0), &train_indices);
        let x_test = x.select(Axis(0), &test_indices);
        let y_train = y.select(Axis(0), &train_indices);
        let y_test = y.select(Axis(0), &test_indices);

        let baselines = self.score_baselines(&x_train, &y_train, &x_test, &y_test)?;

        let mut forest = RandomForestRegressor::new(300)
            .with_max_depth(20)
            .with_min_samples_split(10)
            .with_min_samples_leaf(5)
            .with_max_features(MaxFeatures::Sqrt)
            .with_bootstrap(true)
            .with_oob_score(true)
            .with_seed(self.seed);
        forest.fit(&x_train, &y_train)?;
        let preds = forest.predict(&x_test)?;
        let holdout = RegressionMetrics::compute(&y_test, &preds);
        let oob_score = forest.oob_score();

        let feature_importance: BTreeMap<String, f64> = match forest.feature_importances() {
            Some(importances) => feature_names
                .iter()
                .cloned()
                .zip(importances.iter().copied())
                .collect(),
            None => BTreeMap::new(),
        };

        info!(
            n_train = train_indices.len(),
            n_test = test_indices.len(),
            r2 = holdout.r2,
            mae = holdout.mae,
            rmse = holdout.rmse,
            oob = ?oob_score,
            "production forest trained"
        );

        Ok(TrainedModel {
            forest,
            holdout,
            oob_score,
            feature_importance,
            baselines,
            n_train: train_indices.len(),
            n_test: test_indices.len(),
        })
    }

    fn score_baselines(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<Vec<BaselineScore>> {
        let candidates: Vec<(&str, Box<dyn Regressor>)> = vec![
            ("linear_regression", Box::new(LinearRegression::new())),
            (
                "ridge",
                Box::new(LinearRegression::new().with_alpha(1.0)),
            ),
            (
                "random_forest_light",
                Box::new(
                    RandomForestRegressor::new(50)
                        .with_max_depth(10)
                        .with_seed(self.seed),
                ),
            ),
        ];

        let mut scores = Vec::with_capacity(candidates.len());
        for (name, mut model) in candidates {
            model.fit(x_train, y_train)?;
            let preds = model.predict(x_test)?;
            let metrics = RegressionMetrics::compute(y_test, &preds);
            info!(model = name, r2 = metrics.r2, rmse = metrics.rmse, "baseline scored");
            scores.push(BaselineScore {
                model: name.to_string(),
                r2: metrics.r2,
                mae: metrics.mae,
                rmse: metrics.rmse,
            });
        }
        Ok(scores)
    }

    fn split_indices(&self, n_samples: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);
        let n_test = ((n_samples as f64) * self.test_fraction).ceil() as usize;
        let n_test = n_test.clamp(1, n_samples - 1);
        let test = indices[..n_test].to_vec();
        let train = indices[n_test..].to_vec();
        (train, test)
    }
}

/// Everything a downstream consumer needs to judge the model, flattened
/// for JSON serialization alongside the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_type: String,
    pub model_version: String,
    pub trained_at: String,
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub oob_score: Option<f64>,
    pub temporal_cv_r2_mean: f64,
    pub temporal_cv_r2_std: f64,
    pub temporal_cv_folds: usize,
    pub temporal_cv_scores: Vec<FoldMetrics>,
    pub spatial_cv_r2_mean: f64,
    pub spatial_cv_r2_std: f64,
    pub spatial_cv_folds: usize,
    pub spatial_cv_scores: Vec<FoldMetrics>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub total_samples: usize,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub hyperparameters: ForestParams,
    pub feature_importance: BTreeMap<String, f64>,
    pub baseline_comparison: Vec<BaselineScore>,
    pub backfill_seed: u64,
}

impl TrainingReport {
    pub fn new(
        model: &TrainedModel,
        feature_names: &[String],
        temporal: &CVSummary,
        spatial: &CVSummary,
        backfill_seed: u64,
    ) -> Self {
        // When a CV strategy could not run (too few years or districts)
        // the holdout score stands in, with zero spread.
        let (temporal_mean, temporal_std, temporal_folds) = cv_stats(temporal, model.holdout.r2);
        let (spatial_mean, spatial_std, spatial_folds) = cv_stats(spatial, model.holdout.r2);

        Self {
            model_type: "random_forest_regressor".to_string(),
            model_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now().to_rfc3339(),
            r2: model.holdout.r2,
            mae: model.holdout.mae,
            rmse: model.holdout.rmse,
            mape: model.holdout.mape,
            oob_score: model.oob_score,
            temporal_cv_r2_mean: temporal_mean,
            temporal_cv_r2_std: temporal_std,
            temporal_cv_folds: temporal_folds,
            temporal_cv_scores: temporal.folds.clone(),
            spatial_cv_r2_mean: spatial_mean,
            spatial_cv_r2_std: spatial_std,
            spatial_cv_folds: spatial_folds,
            spatial_cv_scores: spatial.folds.clone(),
            train_samples: model.n_train,
            test_samples: model.n_test,
            total_samples: model.n_train + model.n_test,
            n_features: feature_names.len(),
            feature_names: feature_names.to_vec(),
            hyperparameters: model.forest.params().clone(),
            feature_importance: model.feature_importance.clone(),
            baseline_comparison: model.baselines.clone(),
            backfill_seed,
        }
    }

    /// Importances sorted descending, truncated to `k`.
    pub fn top_features(&self, k: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, weight)| (name.clone(), *weight))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }
}

fn cv_stats(summary: &CVSummary, fallback_r2: f64) -> (f64, f64, usize) {
    if summary.is_empty() {
        return (fallback_r2, 0.0, 0);
    }
    (
        summary.r2_mean.unwrap_or(fallback_r2),
        summary.r2_std.unwrap_or(0.0),
        summary.folds.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn synthetic_panel(n: usize) -> (Array2<f64>, Array1<f64>, Vec<String>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 7 + j * 13) % 29) as f64);
        let y = Array1::from_shape_fn(n, |i| {
            2.0 * x[[i, 0]] + 0.5 * x[[i, 1]] + 100.0
        });
        let names = vec![
            "rainfall_scaled".to_string(),
            "temperature_scaled".to_string(),
            "crop_encoded".to_string(),
        ];
        (x, y, names)
    }

    #[test]
    fn test_train_produces_all_baselines() {
        let (x, y, names) = synthetic_panel(60);
        let trained = ModelTrainer::new().train(&x, &y, &names).unwrap();
        let labels: Vec<&str> = trained.baselines.iter().map(|b| b.model.as_str()).collect();
        assert_eq!(
            labels,
            vec!["linear_regression", "ridge", "random_forest_light"]
        );
        assert_eq!(trained.n_train + trained.n_test, 60);
        assert_eq!(trained.n_test, 12);
        assert!(trained.holdout.r2.is_finite());
    }

    #[test]
    fn test_train_is_deterministic_for_seed() {
        let (x, y, names) = synthetic_panel(50);
        let a = ModelTrainer::new().with_seed(7).train(&x, &y, &names).unwrap();
        let b = ModelTrainer::new().with_seed(7).train(&x, &y, &names).unwrap();
        assert_eq!(a.holdout.r2.to_bits(), b.holdout.r2.to_bits());
        assert_eq!(a.n_train, b.n_train);
        assert_eq!(a.feature_importance, b.feature_importance);
    }

    #[test]
    fn test_train_rejects_tiny_datasets() {
        let (x, y, names) = synthetic_panel(5);
        let err = ModelTrainer::new().train(&x, &y, &names);
        assert!(matches!(err, Err(AgriYieldError::TrainingError(_))));
    }

    #[test]
    fn test_importance_keys_match_feature_names() {
        let (x, y, names) = synthetic_panel(40);
        let trained = ModelTrainer::new().train(&x, &y, &names).unwrap();
        let keys: Vec<&String> = trained.feature_importance.keys().collect();
        let mut expected: Vec<&String> = names.iter().collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_report_falls_back_to_holdout_when_cv_empty() {
        let (x, y, names) = synthetic_panel(40);
        let trained = ModelTrainer::new().train(&x, &y, &names).unwrap();
        let report = TrainingReport::new(
            &trained,
            &names,
            &CVSummary::empty("temporal"),
            &CVSummary::empty("spatial"),
            42,
        );
        assert_eq!(report.temporal_cv_folds, 0);
        assert!(report.temporal_cv_scores.is_empty());
        assert!((report.temporal_cv_r2_mean - report.r2).abs() < 1e-12);
        assert_eq!(report.temporal_cv_r2_std, 0.0);
        assert_eq!(report.total_samples, 40);
        assert_eq!(report.n_features, 3);
        assert_eq!(report.model_type, "random_forest_regressor");
    }

    #[test]
    fn test_top_features_ranked_descending() {
        let (x, y, names) = synthetic_panel(40);
        let trained = ModelTrainer::new().train(&x, &y, &names).unwrap();
        let report = TrainingReport::new(
            &trained,
            &names,
            &CVSummary::empty("temporal"),
            &CVSummary::empty("spatial"),
            42,
        );
        let top = report.top_features(2);
        assert_eq!(top.len(), 2);
        assert!(top[0].1 >= top[1].1);
    }
}
