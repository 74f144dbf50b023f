//! Random forest regressor.
//!
//! Trees are fitted in parallel, each from a bootstrap sample drawn with a
//! per-tree seed derived from the forest seed, so results are reproducible
//! regardless of thread scheduling. When bootstrapping, the rows a tree
//! never saw are tracked and used for the out-of-bag estimate.

use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AgriYieldError, Result};
use crate::training::decision_tree::DecisionTreeRegressor;
use crate::training::metrics::r_squared;
use crate::training::Regressor;

/// How many features each split may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Forest hyperparameters, persisted verbatim into the metrics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub oob_score: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            oob_score: false,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    oob_score_value: Option<f64>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            params: ForestParams {
                n_estimators,
                ..ForestParams::default()
            },
            trees: Vec::new(),
            n_features: 0,
            feature_importances: None,
            oob_score_value: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.params.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.params.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.params.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.params.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.params.bootstrap = bootstrap;
        self
    }

    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.params.oob_score = oob_score;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Out-of-bag R², available after fitting with bootstrap and
    /// `oob_score` enabled.
    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score_value
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(AgriYieldError::TrainingError(
                "cannot fit a forest on an empty matrix".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        self.n_features = x.ncols();
        let k = self.params.max_features.resolve(self.n_features);
        let params = self.params.clone();

        let fitted: Result<Vec<(DecisionTreeRegressor, Vec<bool>)>> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let tree_seed = params.seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);

                let (indices, in_bag) = if params.bootstrap {
                    let mut in_bag = vec![false; n_samples];
                    let indices: Vec<usize> = (0..n_samples)
                        .map(|_| (rng.next_u64() as usize) % n_samples)
                        .collect();
                    for &i in &indices {
                        in_bag[i] = true;
                    }
                    (indices, in_bag)
                } else {
                    ((0..n_samples).collect(), vec![true; n_samples])
                };

                let x_sample = x.select(Axis(0), &indices);
                let y_sample = y.select(Axis(0), &indices);

                let mut tree = DecisionTreeRegressor::new()
                    .with_min_samples_split(params.min_samples_split)
                    .with_min_samples_leaf(params.min_samples_leaf)
                    .with_max_features(k)
                    .with_seed(tree_seed);
                if let Some(depth) = params.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(&x_sample, &y_sample)?;
                Ok((tree, in_bag))
            })
            .collect();

        let (trees, in_bags): (Vec<_>, Vec<_>) = fitted?.into_iter().unzip();
        self.trees = trees;
        self.feature_importances = self.average_importances();
        self.oob_score_value = if params.oob_score && params.bootstrap {
            self.compute_oob_score(x, y, &in_bags)
        } else {
            None
        };
        debug!(
            trees = self.trees.len(),
            oob = ?self.oob_score_value,
            "forest fitted"
        );
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AgriYieldError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let per_tree: Result<Vec<Array1<f64>>> =
            self.trees.par_iter().map(|tree| tree.predict(x)).collect();
        let per_tree = per_tree?;

        let n_rows = x.nrows();
        let mut mean = Array1::zeros(n_rows);
        for preds in &per_tree {
            mean += preds;
        }
        mean /= self.trees.len() as f64;
        Ok(mean)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn average_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = Array1::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += &imp;
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Some(total)
    }

    /// Mean prediction over the trees that did not see each row, scored
    /// against the true targets. None when no row was left out anywhere.
    fn compute_oob_score(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        in_bags: &[Vec<bool>],
    ) -> Option<f64> {
        let n_samples = x.nrows();
        let mut sums = vec![0.0; n_samples];
        let mut counts = vec![0usize; n_samples];

        for (tree, in_bag) in self.trees.iter().zip(in_bags) {
            let oob_rows: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
            if oob_rows.is_empty() {
                continue;
            }
            let preds = tree.predict(&x.select(Axis(0), &oob_rows)).ok()?;
            for (j, &row) in oob_rows.iter().enumerate() {
                sums[row] += preds[j];
                counts[row] += 1;
            }
        }

        let mut truths = Vec::new();
        let mut preds = Vec::new();
        for i in 0..n_samples {
            if counts[i] > 0 {
                truths.push(y[i]);
                preds.push(sums[i] / counts[i] as f64);
            }
        }
        if truths.len() < 2 {
            return None;
        }
        Some(r_squared(&Array1::from_vec(truths), &Array1::from_vec(preds)))
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        RandomForestRegressor::feature_importances(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn signal_data() -> (Array2<f64>, Array1<f64>) {
        // y follows feature 0; feature 1 is noise-like but fixed.
        let x = array![
            [1.0, 7.0],
            [2.0, 3.0],
            [3.0, 9.0],
            [4.0, 1.0],
            [5.0, 8.0],
            [6.0, 2.0],
            [7.0, 6.0],
            [8.0, 4.0],
            [9.0, 5.0],
            [10.0, 7.5],
            [11.0, 2.5],
            [12.0, 9.5]
        ];
        let y = array![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 110.0, 120.0];
        (x, y)
    }

    #[test]
    fn test_forest_learns_monotone_signal() {
        let (x, y) = signal_data();
        let mut forest = RandomForestRegressor::new(30).with_seed(42);
        forest.fit(&x, &y).unwrap();
        let preds = forest.predict(&x).unwrap();
        let r2 = r_squared(&y, &preds);
        assert!(r2 > 0.8, "train r2 too low: {r2}");
    }

    #[test]
    fn test_fit_is_deterministic_for_fixed_seed() {
        let (x, y) = signal_data();
        let mut a = RandomForestRegressor::new(15).with_seed(7);
        let mut b = RandomForestRegressor::new(15).with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_oob_score_computed_when_enabled() {
        let (x, y) = signal_data();
        let mut forest = RandomForestRegressor::new(40).with_oob_score(true).with_seed(42);
        forest.fit(&x, &y).unwrap();
        let oob = forest.oob_score().unwrap();
        assert!(oob.is_finite());

        let mut without = RandomForestRegressor::new(10).with_seed(42);
        without.fit(&x, &y).unwrap();
        assert!(without.oob_score().is_none());
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = signal_data();
        let mut forest = RandomForestRegressor::new(20).with_seed(42);
        forest.fit(&x, &y).unwrap();
        let imp = forest.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1], "signal feature should dominate");
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(11), 4);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::All.resolve(11), 11);
        assert_eq!(MaxFeatures::Fixed(3).resolve(11), 3);
        assert_eq!(MaxFeatures::Fixed(99).resolve(11), 11);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forest = RandomForestRegressor::new(5);
        assert!(matches!(
            forest.predict(&array![[1.0, 2.0]]),
            Err(AgriYieldError::NotFitted)
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut forest = RandomForestRegressor::new(5);
        assert!(matches!(
            forest.fit(&x, &y),
            Err(AgriYieldError::ShapeMismatch { .. })
        ));
    }
}
