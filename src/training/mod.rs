//! Model training: estimators, metrics, cross-validation and the trainer
//! that produces the final yield model.

pub mod decision_tree;
pub mod linear;
pub mod metrics;
pub mod random_forest;
pub mod trainer;
pub mod validation;

pub use decision_tree::DecisionTreeRegressor;
pub use linear::LinearRegression;
pub use metrics::{r_squared, RegressionMetrics};
pub use random_forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use trainer::{BaselineScore, ModelTrainer, TrainedModel, TrainingReport};
pub use validation::{
    spatial_district_folds, temporal_year_folds, CVSplit, CVSummary, FoldMetrics,
    ValidationOrchestrator,
};

use ndarray::{Array1, Array2};

use crate::error::Result;

/// Common interface for trainable regression estimators.
///
/// Cross-validation and the baseline comparison both fit fresh estimators
/// through this trait so they stay agnostic to the concrete model.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}
