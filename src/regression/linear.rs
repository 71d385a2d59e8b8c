//! Ridge regression over features plus pairwise interaction terms.
//!
//! The interaction expansion lets a linear solve capture feature products;
//! the ridge term keeps the normal equations invertible on small or
//! collinear corpora.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, PredictionError, Result};
use crate::regression::{check_input, check_paired, Regressor};

const PIVOT_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RidgeConfig {
    /// L2 damping added to the normal-equation diagonal.
    pub lambda: f64,
    /// Whether to append pairwise products of the input features.
    pub interactions: bool,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            interactions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    config: RidgeConfig,
    weights: Vec<f64>,
    n_features: usize,
}

impl RidgeRegressor {
    pub fn new(config: RidgeConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            n_features: 0,
        }
    }

    fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Bias term, raw features, then (optionally) products of feature pairs.
    fn expand(&self, x: &[f64]) -> Vec<f64> {
        let mut expanded = Vec::with_capacity(self.expanded_dim(x.len()));
        expanded.push(1.0);
        expanded.extend_from_slice(x);
        if self.config.interactions {
            for i in 0..x.len() {
                for j in (i + 1)..x.len() {
                    expanded.push(x[i] * x[j]);
                }
            }
        }
        expanded
    }

    fn expanded_dim(&self, n: usize) -> usize {
        let base = 1 + n;
        if self.config.interactions {
            base + n * (n - 1) / 2
        } else {
            base
        }
    }
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(RidgeConfig::default())
    }
}

impl Regressor for RidgeRegressor {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        check_paired("ridge fit", features, targets)?;
        self.n_features = features[0].len();

        let rows: Vec<Vec<f64>> = features.iter().map(|x| self.expand(x)).collect();
        let d = rows[0].len();

        // A = X^T X + lambda I, b = X^T y
        let mut a = vec![vec![0.0; d]; d];
        let mut b = vec![0.0; d];
        for (row, target) in rows.iter().zip(targets) {
            for i in 0..d {
                for j in 0..d {
                    a[i][j] += row[i] * row[j];
                }
                b[i] += target * row[i];
            }
        }
        let lambda = self.config.lambda.max(PIVOT_EPSILON);
        for (i, row) in a.iter_mut().enumerate() {
            row[i] += lambda;
        }

        let a_inv = invert_matrix(&a);
        self.weights = matrix_vector_mul(&a_inv, &b);

        if self.weights.iter().any(|w| !w.is_finite()) {
            self.weights.clear();
            return Err(PredictionError::NonFinite {
                context: "ridge fit solution".to_string(),
            });
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(PredictionError::NotFitted("ridge regressor"));
        }
        check_input("ridge predict", features, self.n_features)?;
        let expanded = self.expand(features);
        let estimate = dot_product(&self.weights, &expanded);
        ensure_finite(estimate, "ridge predict")
    }
}

/// Gauss-Jordan inversion with partial pivoting; singular inputs are damped
/// instead of failing so the fit degrades smoothly.
fn invert_matrix(m: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = m.len();
    let mut aug = vec![vec![0.0; 2 * n]; n];
    for i in 0..n {
        for j in 0..n {
            aug[i][j] = m[i][j];
        }
        aug[i][n + i] = 1.0;
    }

    let mut is_singular = false;

    for i in 0..n {
        let mut max_row = i;
        for k in (i + 1)..n {
            if aug[k][i].abs() > aug[max_row][i].abs() {
                max_row = k;
            }
        }
        aug.swap(i, max_row);

        let pivot = aug[i][i];
        if pivot.abs() < PIVOT_EPSILON {
            is_singular = true;
            aug[i][i] = PIVOT_EPSILON;
        }

        let pivot = aug[i][i];
        for j in 0..(2 * n) {
            aug[i][j] /= pivot;
        }

        for k in 0..n {
            if k != i {
                let factor = aug[k][i];
                for j in 0..(2 * n) {
                    aug[k][j] -= factor * aug[i][j];
                }
            }
        }
    }

    let mut result = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let val = aug[i][n + j];
            result[i][j] = if val.is_nan() || val.is_infinite() {
                if i == j {
                    1.0
                } else {
                    0.0
                }
            } else {
                val
            };
        }
    }

    if is_singular {
        for (i, row) in result.iter_mut().enumerate() {
            row[i] = row[i].max(1e-6);
        }
    }

    result
}

fn matrix_vector_mul(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    let n = m.len();
    let mut result = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            result[i] += m[i][j] * v[j];
        }
    }
    result
}

fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
