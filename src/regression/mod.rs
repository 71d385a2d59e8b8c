//! Trainable score estimators behind a common fit/predict/evaluate contract.
//!
//! Implementations are swappable: the ridge model handles small corpora and
//! the feed-forward network picks up non-linear structure on larger ones.
//! Prediction is always deterministic; stochastic regularization is a
//! training-time concern only.

pub mod linear;
pub mod metrics;
pub mod mlp;

pub use linear::{RidgeConfig, RidgeRegressor};
pub use metrics::RegressionMetrics;
pub use mlp::{MlpConfig, MlpRegressor};

use crate::error::{PredictionError, Result};

pub trait Regressor: Send + Sync {
    /// Trains on paired feature vectors and targets.
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()>;

    /// Returns a continuous score estimate for one feature vector.
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Validation metrics over a held-out set.
    fn evaluate(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<RegressionMetrics> {
        check_paired("regressor evaluate", features, targets)?;
        let predictions = features
            .iter()
            .map(|x| self.predict(x))
            .collect::<Result<Vec<f64>>>()?;
        Ok(metrics::compute(&predictions, targets))
    }
}

/// Shared shape validation for fit/evaluate inputs.
pub(crate) fn check_paired(
    context: &'static str,
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<()> {
    if features.len() != targets.len() {
        return Err(PredictionError::DimensionMismatch {
            context,
            expected: features.len(),
            got: targets.len(),
        });
    }
    if features.is_empty() {
        return Err(PredictionError::InsufficientData {
            context,
            needed: 1,
            got: 0,
        });
    }
    let dim = features[0].len();
    for row in features {
        if row.len() != dim {
            return Err(PredictionError::DimensionMismatch {
                context,
                expected: dim,
                got: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(PredictionError::NonFinite {
                context: context.to_string(),
            });
        }
    }
    if targets.iter().any(|t| !t.is_finite()) {
        return Err(PredictionError::NonFinite {
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Validates a single inference input against the fitted dimension.
pub(crate) fn check_input(context: &'static str, features: &[f64], dim: usize) -> Result<()> {
    if features.len() != dim {
        return Err(PredictionError::DimensionMismatch {
            context,
            expected: dim,
            got: features.len(),
        });
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(PredictionError::NonFinite {
            context: context.to_string(),
        });
    }
    Ok(())
}
