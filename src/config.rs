//! Engine configuration.
//!
//! Heuristic defaults that deployments are expected to tune live here, with
//! env-var overrides.

use serde::{Deserialize, Serialize};

use crate::types::BktParameters;

/// Weights for blending the regressor estimate with mean skill mastery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlendWeights {
    pub regressor: f64,
    pub mastery: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            regressor: 0.7,
            mastery: 0.3,
        }
    }
}

impl BlendWeights {
    /// Rescales so the two weights sum to 1.0; falls back to defaults when
    /// both are zero.
    pub fn normalized(self) -> Self {
        let total = self.regressor + self.mastery;
        if total <= f64::EPSILON {
            return Self::default();
        }
        Self {
            regressor: self.regressor / total,
            mastery: self.mastery / total,
        }
    }
}

/// Mastery cut-offs for risk classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Below this mastery the skill is high risk.
    pub high: f64,
    /// Below this mastery (and at or above `high`) the skill is medium risk.
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 0.4,
            medium: 0.7,
        }
    }
}

/// Data-sufficiency floors for the fitting paths.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitLimits {
    /// Minimum distinct samples before scaling statistics are meaningful.
    pub min_scaling_samples: usize,
    /// Minimum records before the BKT heuristic abandons defaults.
    pub min_bkt_records: usize,
}

impl Default for FitLimits {
    fn default() -> Self {
        Self {
            min_scaling_samples: 2,
            min_bkt_records: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub blend: BlendWeights,
    pub risk: RiskThresholds,
    pub limits: FitLimits,
    pub bkt_defaults: BktParameters,
    /// A retrained model is only adopted if its validation R² does not fall
    /// more than this amount below the live model's.
    pub r2_regression_floor: f64,
    /// Number of most recent records used for the confidence variance term.
    pub confidence_window: usize,
    /// Record count at which history no longer limits confidence.
    pub confidence_saturation: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blend: BlendWeights::default(),
            risk: RiskThresholds::default(),
            limits: FitLimits::default(),
            bkt_defaults: BktParameters::default(),
            r2_regression_floor: 0.05,
            confidence_window: 10,
            confidence_saturation: 20,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_f64("SKILLTRACE_BLEND_REGRESSOR") {
            config.blend.regressor = val;
        }
        if let Some(val) = env_f64("SKILLTRACE_BLEND_MASTERY") {
            config.blend.mastery = val;
        }
        if let Some(val) = env_f64("SKILLTRACE_RISK_HIGH") {
            config.risk.high = val;
        }
        if let Some(val) = env_f64("SKILLTRACE_RISK_MEDIUM") {
            config.risk.medium = val;
        }
        if let Some(val) = env_f64("SKILLTRACE_R2_FLOOR") {
            config.r2_regression_floor = val;
        }
        if let Some(val) = env_f64("SKILLTRACE_BKT_DECAY_RATE") {
            config.bkt_defaults.decay_rate = val.max(0.0);
        }

        config.blend = config.blend.normalized();
        config
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blend_is_point_seven_point_three() {
        let blend = BlendWeights::default();
        assert!((blend.regressor - 0.7).abs() < 1e-12);
        assert!((blend.mastery - 0.3).abs() < 1e-12);
    }

    #[test]
    fn blend_normalizes_to_unit_sum() {
        let blend = BlendWeights {
            regressor: 2.0,
            mastery: 2.0,
        }
        .normalized();
        assert!((blend.regressor - 0.5).abs() < 1e-12);
        assert!((blend.mastery - 0.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_blend_falls_back_to_defaults() {
        let blend = BlendWeights {
            regressor: 0.0,
            mastery: 0.0,
        }
        .normalized();
        assert!((blend.regressor - 0.7).abs() < 1e-12);
    }

    #[test]
    fn default_risk_thresholds_match_contract() {
        let risk = RiskThresholds::default();
        assert_eq!(risk.high, 0.4);
        assert_eq!(risk.medium, 0.7);
    }
}
