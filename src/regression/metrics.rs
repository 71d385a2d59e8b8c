use serde::{Deserialize, Serialize};

/// Standard regression validation metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Computes mse/mae/r2 for paired predictions and targets.
///
/// Callers guarantee equal, non-zero lengths. A target set with zero variance
/// reports r2 = 0.0 rather than dividing by zero.
pub fn compute(predictions: &[f64], targets: &[f64]) -> RegressionMetrics {
    let n = targets.len() as f64;
    let mse = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / n;
    let mae = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / n;

    let mean = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    let r2 = if ss_tot < 1e-12 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    RegressionMetrics { mse, mae, r2 }
}
