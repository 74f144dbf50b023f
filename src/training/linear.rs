//! Linear baselines: ordinary least squares and ridge regression.
//!
//! Both center the data, solve the normal equations and recover the
//! intercept from the means, so the ridge penalty never shrinks the
//! intercept. The solver tries a Cholesky factorization first and falls
//! back to Gauss-Jordan inversion for ill-conditioned systems.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AgriYieldError, Result};
use crate::training::Regressor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// L2 penalty; zero gives ordinary least squares.
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 || n_samples != y.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AgriYieldError::TrainingError("empty design matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let mut xtx = x_centered.t().dot(&x_centered);
        if self.alpha > 0.0 {
            for i in 0..xtx.nrows() {
                xtx[[i, i]] += self.alpha;
            }
        }
        let xty = x_centered.t().dot(&y_centered);

        let coefficients = solve_normal_equations(&xtx, &xty)?;
        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or(AgriYieldError::NotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(AgriYieldError::ShapeMismatch {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }
}

/// Solves `a * w = b` for a symmetric positive semi-definite `a`.
fn solve_normal_equations(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    if let Some(solution) = solve_spd(a, b) {
        return Ok(solution);
    }
    let inverse = gauss_jordan_inverse(a)?;
    Ok(inverse.dot(b))
}

/// Cholesky solve with a single jittered retry for nearly-singular
/// matrices. Returns None when even the jittered factorization fails.
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(l) = cholesky(a) {
        return Some(cholesky_solve(&l, b));
    }
    let n = a.nrows();
    let mean_diag = (0..n).map(|i| a[[i, i]].abs()).sum::<f64>() / n.max(1) as f64;
    let jitter = 1e-8 * mean_diag.max(1.0);
    let mut regularized = a.clone();
    for i in 0..n {
        regularized[[i, i]] += jitter;
    }
    cholesky(&regularized).map(|l| cholesky_solve(&l, b))
}

/// Lower-triangular Cholesky factor, or None if `a` is not positive
/// definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l: Array2<f64> = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Forward substitution on L, then back substitution on L^T.
fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    let mut w = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * w[k];
        }
        w[i] = sum / l[[i, i]];
    }
    w
}

fn gauss_jordan_inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| aug[[r1, col]].abs().total_cmp(&aug[[r2, col]].abs()))
            .unwrap_or(col);
        if aug[[pivot_row, col]].abs() < 1e-10 {
            return Err(AgriYieldError::TrainingError(
                "singular design matrix in linear baseline".to_string(),
            ));
        }
        if pivot_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[pivot_row, j]];
                aug[[pivot_row, j]] = tmp;
            }
        }
        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..2 * n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    let mut inverse = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inverse[[i, j]] = aug[[i, n + j]];
        }
    }
    Ok(inverse)
}
