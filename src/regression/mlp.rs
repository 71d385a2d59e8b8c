//! Small feed-forward network trained by mini-batch gradient descent on MSE.
//!
//! Weight init, shuffling, and dropout masks all draw from a seeded ChaCha
//! stream, so a fit with the same config and corpus reproduces the same
//! model. Dropout is inverted and training-only; inference is deterministic.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, PredictionError, Result};
use crate::regression::{check_input, check_paired, Regressor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Fraction of hidden units dropped per training pass.
    pub dropout: f64,
    /// Fraction of the corpus held out for early stopping.
    pub validation_split: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![16],
            learning_rate: 0.02,
            max_epochs: 400,
            batch_size: 16,
            dropout: 0.1,
            validation_split: 0.2,
            patience: 25,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpRegressor {
    config: MlpConfig,
    // weights[layer][out][in]
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
    n_features: usize,
}

impl MlpRegressor {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
        }
    }

    fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    fn layer_sizes(&self, n_features: usize) -> Vec<usize> {
        let mut sizes = vec![n_features];
        sizes.extend(self.config.hidden_layers.iter().copied());
        sizes.push(1);
        sizes
    }

    fn init_parameters(&mut self, n_features: usize, rng: &mut ChaCha8Rng) {
        let sizes = self.layer_sizes(n_features);
        self.weights.clear();
        self.biases.clear();
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let layer = (0..fan_out)
                .map(|_| (0..fan_in).map(|_| rng.gen_range(-limit..limit)).collect())
                .collect();
            self.weights.push(layer);
            self.biases.push(vec![0.0; fan_out]);
        }
        self.n_features = n_features;
    }

    /// Forward pass returning post-activation values per layer (input first).
    fn forward(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = vec![input.to_vec()];
        let last = self.weights.len() - 1;
        for (layer, (weights, biases)) in self.weights.iter().zip(&self.biases).enumerate() {
            let prev = &activations[layer];
            let mut out = Vec::with_capacity(weights.len());
            for (unit_weights, bias) in weights.iter().zip(biases) {
                let mut sum = *bias;
                for (w, a) in unit_weights.iter().zip(prev) {
                    sum += w * a;
                }
                // Hidden layers are ReLU; the output unit stays linear.
                out.push(if layer < last { sum.max(0.0) } else { sum });
            }
            activations.push(out);
        }
        activations
    }

    /// One mini-batch gradient step with inverted dropout on hidden layers.
    fn train_batch(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        batch: &[usize],
        rng: &mut ChaCha8Rng,
    ) {
        let layer_count = self.weights.len();
        let mut weight_grads: Vec<Vec<Vec<f64>>> = self
            .weights
            .iter()
            .map(|layer| layer.iter().map(|row| vec![0.0; row.len()]).collect())
            .collect();
        let mut bias_grads: Vec<Vec<f64>> =
            self.biases.iter().map(|layer| vec![0.0; layer.len()]).collect();

        let keep = 1.0 - self.config.dropout.clamp(0.0, 0.9);

        for &idx in batch {
            let mut activations = self.forward(&features[idx]);

            // Drop hidden units after the fact and rescale survivors so the
            // expected activation matches inference.
            let mut masks: Vec<Vec<f64>> = Vec::with_capacity(layer_count.saturating_sub(1));
            if self.config.dropout > 0.0 {
                for layer in 1..layer_count {
                    let mask: Vec<f64> = activations[layer]
                        .iter()
                        .map(|_| {
                            if rng.gen_range(0.0..1.0) < keep {
                                1.0 / keep
                            } else {
                                0.0
                            }
                        })
                        .collect();
                    for (a, m) in activations[layer].iter_mut().zip(&mask) {
                        *a *= m;
                    }
                    masks.push(mask);
                }
            }

            let prediction = activations[layer_count][0];
            // d(MSE)/d(pred) for one sample.
            let mut delta = vec![prediction - targets[idx]];

            for layer in (0..layer_count).rev() {
                let prev = &activations[layer];
                for (unit, d) in delta.iter().enumerate() {
                    bias_grads[layer][unit] += d;
                    for (j, a) in prev.iter().enumerate() {
                        weight_grads[layer][unit][j] += d * a;
                    }
                }
                if layer == 0 {
                    break;
                }
                let mut next_delta = vec![0.0; prev.len()];
                for (unit, d) in delta.iter().enumerate() {
                    for (j, w) in self.weights[layer][unit].iter().enumerate() {
                        next_delta[j] += d * w;
                    }
                }
                // ReLU gate, then the dropout mask applied on the way forward.
                for (j, nd) in next_delta.iter_mut().enumerate() {
                    if activations[layer][j] <= 0.0 {
                        *nd = 0.0;
                    } else if let Some(mask) = masks.get(layer - 1) {
                        *nd *= mask[j];
                    }
                }
                delta = next_delta;
            }
        }

        let step = self.config.learning_rate / batch.len() as f64;
        for layer in 0..layer_count {
            for unit in 0..self.weights[layer].len() {
                self.biases[layer][unit] -= step * bias_grads[layer][unit];
                for j in 0..self.weights[layer][unit].len() {
                    self.weights[layer][unit][j] -= step * weight_grads[layer][unit][j];
                }
            }
        }
    }

    fn mse_over(&self, features: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> f64 {
        let sum: f64 = indices
            .iter()
            .map(|&i| {
                let activations = self.forward(&features[i]);
                (activations[self.weights.len()][0] - targets[i]).powi(2)
            })
            .sum();
        sum / indices.len() as f64
    }
}

impl Default for MlpRegressor {
    fn default() -> Self {
        Self::new(MlpConfig::default())
    }
}

impl Regressor for MlpRegressor {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        check_paired("mlp fit", features, targets)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.init_parameters(features[0].len(), &mut rng);

        let mut indices: Vec<usize> = (0..features.len()).collect();
        indices.shuffle(&mut rng);

        let val_count = if self.config.validation_split > 0.0 && features.len() >= 10 {
            ((features.len() as f64 * self.config.validation_split) as usize).max(1)
        } else {
            0
        };
        let (val_indices, train_indices) = indices.split_at(val_count);
        let mut train_indices = train_indices.to_vec();
        let monitor_indices: Vec<usize> = if val_count > 0 {
            val_indices.to_vec()
        } else {
            train_indices.clone()
        };

        let batch_size = self.config.batch_size.max(1);
        let mut best_mse = f64::INFINITY;
        let mut best_weights = self.weights.clone();
        let mut best_biases = self.biases.clone();
        let mut stale_epochs = 0usize;

        for epoch in 0..self.config.max_epochs {
            train_indices.shuffle(&mut rng);
            for batch in train_indices.chunks(batch_size) {
                self.train_batch(features, targets, batch, &mut rng);
            }

            let monitor_mse = self.mse_over(features, targets, &monitor_indices);
            if !monitor_mse.is_finite() {
                self.weights.clear();
                return Err(PredictionError::NonFinite {
                    context: format!("mlp fit diverged at epoch {epoch}"),
                });
            }
            if monitor_mse < best_mse - 1e-9 {
                best_mse = monitor_mse;
                best_weights = self.weights.clone();
                best_biases = self.biases.clone();
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                if stale_epochs >= self.config.patience {
                    tracing::debug!(epoch, best_mse, "early stop");
                    break;
                }
            }
        }

        self.weights = best_weights;
        self.biases = best_biases;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(PredictionError::NotFitted("mlp regressor"));
        }
        check_input("mlp predict", features, self.n_features)?;
        let activations = self.forward(features);
        let estimate = activations[self.weights.len()][0];
        ensure_finite(estimate, "mlp predict")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_corpus() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64 / 64.0]).collect();
        let targets: Vec<f64> = features.iter().map(|x| 0.2 + 0.6 * x[0]).collect();
        (features, targets)
    }

    #[test]
    fn fit_rejects_mismatched_counts() {
        let mut model = MlpRegressor::default();
        let err = model.fit(&[vec![1.0]], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PredictionError::DimensionMismatch { .. }));
    }

    #[test]
    fn predict_before_fit_fails() {
        let model = MlpRegressor::default();
        assert!(matches!(
            model.predict(&[0.5]).unwrap_err(),
            PredictionError::NotFitted(_)
        ));
    }

    #[test]
    fn learns_a_smooth_target() {
        let (features, targets) = linear_corpus();
        let mut model = MlpRegressor::new(MlpConfig {
            hidden_layers: vec![8],
            dropout: 0.0,
            ..MlpConfig::default()
        });
        model.fit(&features, &targets).unwrap();
        let metrics = model.evaluate(&features, &targets).unwrap();
        assert!(metrics.r2 > 0.8, "r2 was {}", metrics.r2);
    }

    #[test]
    fn inference_is_deterministic() {
        let (features, targets) = linear_corpus();
        let mut model = MlpRegressor::default();
        model.fit(&features, &targets).unwrap();
        let a = model.predict(&[0.37]).unwrap();
        let b = model.predict(&[0.37]).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn same_seed_reproduces_the_same_model() {
        let (features, targets) = linear_corpus();
        let mut first = MlpRegressor::default();
        let mut second = MlpRegressor::default();
        first.fit(&features, &targets).unwrap();
        second.fit(&features, &targets).unwrap();
        let a = first.predict(&[0.5]).unwrap();
        let b = second.predict(&[0.5]).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn predict_checks_input_dimension() {
        let (features, targets) = linear_corpus();
        let mut model = MlpRegressor::default();
        model.fit(&features, &targets).unwrap();
        assert!(matches!(
            model.predict(&[0.5, 0.5]).unwrap_err(),
            PredictionError::DimensionMismatch { .. }
        ));
    }
}
