//! Cross-validation tailored to yield panels.
//!
//! Random K-fold leaks badly on this data: the same district appears in
//! train and test, and future years inform past predictions. The two
//! strategies here hold out whole years (temporal) and whole districts
//! (spatial) instead.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::training::metrics::RegressionMetrics;
use crate::training::Regressor;

/// Folds with fewer held-out rows than this are skipped; the metric
/// would be noise.
pub const MIN_TEST_ROWS: usize = 10;

/// Row indices for one train/test split.
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub fold: usize,
    pub label: String,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub label: String,
    pub n_train: usize,
    pub n_test: usize,
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

/// Aggregate over the folds of one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVSummary {
    pub strategy: String,
    pub folds: Vec<FoldMetrics>,
    pub r2_mean: Option<f64>,
    pub r2_std: Option<f64>,
}

impl CVSummary {
    pub fn empty(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            folds: Vec::new(),
            r2_mean: None,
            r2_std: None,
        }
    }

    pub fn from_folds(strategy: &str, folds: Vec<FoldMetrics>) -> Self {
        if folds.is_empty() {
            return Self::empty(strategy);
        }
        let n = folds.len() as f64;
        let mean = folds.iter().map(|f| f.r2).sum::<f64>() / n;
        let variance = folds.iter().map(|f| (f.r2 - mean).powi(2)).sum::<f64>() / n;
        Self {
            strategy: strategy.to_string(),
            folds,
            r2_mean: Some(mean),
            r2_std: Some(variance.sqrt()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }
}

/// Expanding-window folds over calendar years. Each fold trains on all
/// years strictly before the held-out year, newest years tested first.
pub fn temporal_year_folds(years: &[Option<i64>], n_splits: usize) -> Vec<CVSplit> {
    let mut distinct: Vec<i64> = years.iter().flatten().copied().collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 3 {
        return Vec::new();
    }

    // Always leave at least two years of training history.
    let max_folds = n_splits.min(distinct.len() - 2);
    let mut splits = Vec::new();
    for i in 0..max_folds {
        let test_year = distinct[distinct.len() - 1 - i];
        let train_years = distinct.len() - 1 - i;
        if train_years < 2 {
            break;
        }
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();
        for (row, year) in years.iter().enumerate() {
            match year {
                Some(y) if *y == test_year => test_indices.push(row),
                Some(y) if *y < test_year => train_indices.push(row),
                _ => {}
            }
        }
        if test_indices.len() < MIN_TEST_ROWS || train_indices.is_empty() {
            continue;
        }
        splits.push(CVSplit {
            fold: splits.len(),
            label: format!("year {}", test_year),
            train_indices,
            test_indices,
        });
    }
    splits
}

/// Group K-fold over districts: every district's rows land in exactly
/// one test fold, so no fold ever scores a district it trained on.
pub fn spatial_district_folds(districts: &[Option<String>], n_splits: usize) -> Vec<CVSplit> {
    let mut names: Vec<&str> = districts
        .iter()
        .flatten()
        .map(|s| s.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();
    if names.len() < 2 {
        return Vec::new();
    }
    let n_folds = n_splits.min(names.len());
    if n_folds < 2 {
        return Vec::new();
    }

    let fold_of = |district: &str| -> Option<usize> {
        names
            .binary_search(&district)
            .ok()
            .map(|rank| rank % n_folds)
    };

    let mut splits = Vec::new();
    for fold in 0..n_folds {
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();
        let mut held_out = 0usize;
        for (row, district) in districts.iter().enumerate() {
            let Some(name) = district else { continue };
            match fold_of(name) {
                Some(f) if f == fold => test_indices.push(row),
                Some(_) => train_indices.push(row),
                None => {}
            }
        }
        for (rank, _) in names.iter().enumerate() {
            if rank % n_folds == fold {
                held_out += 1;
            }
        }
        if test_indices.len() < MIN_TEST_ROWS || train_indices.is_empty() {
            continue;
        }
        splits.push(CVSplit {
            fold: splits.len(),
            label: format!("{} districts", held_out),
            train_indices,
            test_indices,
        });
    }
    splits
}

/// Runs the fold strategies against a model factory. A fresh estimator
/// is fitted per fold so no state bleeds between folds.
#[derive(Debug, Clone)]
pub struct ValidationOrchestrator {
    n_splits: usize,
}

impl ValidationOrchestrator {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn temporal_cv<F>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        years: &[Option<i64>],
        make_model: F,
    ) -> Result<CVSummary>
    where
        F: FnMut() -> Box<dyn Regressor>,
    {
        let splits = temporal_year_folds(years, self.n_splits);
        self.evaluate("temporal", splits, x, y, make_model)
    }

    pub fn spatial_cv<F>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        districts: &[Option<String>],
        make_model: F,
    ) -> Result<CVSummary>
    where
        F: FnMut() -> Box<dyn Regressor>,
    {
        let splits = spatial_district_folds(districts, self.n_splits);
        self.evaluate("spatial", splits, x, y, make_model)
    }

    fn evaluate<F>(
        &self,
        strategy: &str,
        splits: Vec<CVSplit>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        mut make_model: F,
    ) -> Result<CVSummary>
    where
        F: FnMut() -> Box<dyn Regressor>,
    {
        if splits.is_empty() {
            info!(strategy, "not enough groups for cross-validation, skipping");
            return Ok(CVSummary::empty(strategy));
        }

        let mut folds = Vec::with_capacity(splits.len());
        for split in splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = make_model();
            model.fit(&x_train, &y_train)?;
            let preds = model.predict(&x_test)?;
            let metrics = RegressionMetrics::compute(&y_test, &preds);

            info!(
                strategy,
                fold = split.fold,
                label = %split.label,
                n_train = split.train_indices.len(),
                n_test = split.test_indices.len(),
                r2 = metrics.r2,
                rmse = metrics.rmse,
                "fold complete"
            );
            folds.push(FoldMetrics {
                fold: split.fold,
                label: split.label,
                n_train: split.train_indices.len(),
                n_test: split.test_indices.len(),
                r2: metrics.r2,
                mae: metrics.mae,
                rmse: metrics.rmse,
            });
        }
        Ok(CVSummary::from_folds(strategy, folds))
    }
}
