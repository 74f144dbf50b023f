//! Regression tree with variance-reduction splits.
//!
//! Thresholds are midpoints between consecutive distinct feature values,
//! scored with an incremental left/right sum scan. When `max_features` is
//! set, each split considers a fresh random subset of features drawn from
//! the tree's seeded generator, which is what gives a forest of these
//! trees its decorrelation.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AgriYieldError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Impurity decrease relative to the parent node.
    gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features considered per split; `None` means all.
    pub max_features: Option<usize>,
    pub seed: u64,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            root: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, k: usize) -> Self {
        self.max_features = Some(k);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(AgriYieldError::TrainingError(
                "cannot fit a tree on an empty matrix".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        self.n_features = x.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_node(x, y, indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        self.root = Some(root);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AgriYieldError::NotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let values: Vec<f64> = x.rows().into_iter().map(|row| predict_row(root, row)).collect();
        Ok(Array1::from_vec(values))
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, node_leaves)
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let (mean, impurity) = mean_and_variance(y, &indices);

        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || n < self.min_samples_split || impurity <= 1e-12 {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        }

        let candidates = self.candidate_features(rng);
        let best = find_best_split(x, y, &indices, &candidates, self.min_samples_leaf, impurity);
        let split = match best {
            Some(split) => split,
            None => {
                return TreeNode::Leaf {
                    value: mean,
                    n_samples: n,
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);

        importances[split.feature_idx] += n as f64 * split.gain;

        let left = self.build_node(x, y, left_idx, depth + 1, importances, rng);
        let right = self.build_node(x, y, right_idx, depth + 1, importances, rng);
        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples: n,
        }
    }

    /// Features eligible for the next split: a seeded random subset of
    /// size `max_features`, or all of them.
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = self.max_features {
            if k < self.n_features {
                features.shuffle(rng);
                features.truncate(k.max(1));
            }
        }
        features
    }
}

fn predict_row(node: &TreeNode, row: ArrayView1<f64>) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if row[*feature_idx] <= *threshold {
                predict_row(left, row)
            } else {
                predict_row(right, row)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn node_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => node_leaves(left) + node_leaves(right),
    }
}

fn mean_and_variance(y: &Array1<f64>, indices: &[usize]) -> (f64, f64) {
    let n = indices.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
        (s + y[i], sq + y[i] * y[i])
    });
    let mean = sum / n;
    (mean, (sq_sum / n - mean * mean).max(0.0))
}

fn find_best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    features: &[usize],
    min_samples_leaf: usize,
    parent_impurity: f64,
) -> Option<SplitCandidate> {
    features
        .par_iter()
        .filter_map(|&feature_idx| {
            best_split_for_feature(x, y, indices, feature_idx, min_samples_leaf, parent_impurity)
        })
        .max_by(|a, b| a.gain.total_cmp(&b.gain))
}

fn best_split_for_feature(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    feature_idx: usize,
    min_samples_leaf: usize,
    parent_impurity: f64,
) -> Option<SplitCandidate> {
    let mut pairs: Vec<(f64, f64)> = indices
        .iter()
        .map(|&i| (x[[i, feature_idx]], y[i]))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = pairs.len() as f64;
    let (total_sum, total_sq) = pairs
        .iter()
        .fold((0.0, 0.0), |(s, sq), (_, t)| (s + t, sq + t * t));

    let mut left_n = 0.0;
    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for i in 0..pairs.len() - 1 {
        let (value, target) = pairs[i];
        left_n += 1.0;
        left_sum += target;
        left_sq += target * target;

        let next_value = pairs[i + 1].0;
        if value == next_value {
            continue;
        }
        let right_n = n - left_n;
        if (left_n as usize) < min_samples_leaf || (right_n as usize) < min_samples_leaf {
            continue;
        }

        let left_mean = left_sum / left_n;
        let right_sum = total_sum - left_sum;
        let right_mean = right_sum / right_n;
        let left_imp = (left_sq / left_n - left_mean * left_mean).max(0.0);
        let right_imp = ((total_sq - left_sq) / right_n - right_mean * right_mean).max(0.0);
        let weighted = (left_n * left_imp + right_n * right_imp) / n;
        let gain = parent_impurity - weighted;

        if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature_idx,
                threshold: (value + next_value) / 2.0,
                gain,
            });
        }
    }
    best
}
