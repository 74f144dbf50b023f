//! Regression quality metrics.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Coefficient of determination. A constant target yields 0.0 rather than
/// a division by zero.
pub fn r_squared(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error with a +1 denominator so zero
    /// targets cannot blow it up.
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return Self {
                r2: 0.0,
                mae: 0.0,
                rmse: 0.0,
                mape: 0.0,
            };
        }
        let n_f = n as f64;
        let mae = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n_f;
        let mse = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n_f;
        let mape = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| ((t - p) / (t + 1.0)).abs())
            .sum::<f64>()
            / n_f
            * 100.0;
        Self {
            r2: r_squared(y_true, y_pred),
            mae,
            rmse: mse.sqrt(),
            mape,
        }
    }
}
