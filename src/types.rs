//! Shared data model for the prediction engine.
//!
//! Wire-facing types serialize as camelCase JSON; collaborator services
//! exchange exactly these shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed practice outcome for a (trainee, skill) pair.
///
/// Created by the assessment collaborator; the engine only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub trainee_id: String,
    pub skill_id: String,
    pub timestamp: DateTime<Utc>,
    /// 0.0..=1.0; binary pass/fail outcomes arrive as 0.0 or 1.0.
    pub performance: f64,
    /// Days since the previous practice of this skill, >= 0.
    pub time_since_last_practice_days: f64,
}

impl PerformanceRecord {
    pub fn is_correct(&self) -> bool {
        self.performance >= 0.5
    }
}

/// Current mastery estimate for one (trainee, skill) pair.
///
/// Owned exclusively by the mastery tracker and mutated only through its
/// decay/observe operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryState {
    pub trainee_id: String,
    pub skill_id: String,
    /// Always within [0, 1].
    pub mastery: f64,
    pub last_updated: DateTime<Utc>,
}

/// Knowledge-tracing parameters, global or per-skill.
///
/// Small enough to persist as a flat JSON record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BktParameters {
    pub p_init: f64,
    pub p_transit: f64,
    pub p_slip: f64,
    pub p_guess: f64,
    pub decay_rate: f64,
}

impl Default for BktParameters {
    fn default() -> Self {
        Self {
            p_init: 0.3,
            p_transit: 0.1,
            p_slip: 0.1,
            p_guess: 0.05,
            decay_rate: 0.01,
        }
    }
}

impl BktParameters {
    /// Clamps probabilities to [0, 1] and the decay rate to >= 0.
    pub fn clamped(self) -> Self {
        Self {
            p_init: self.p_init.clamp(0.0, 1.0),
            p_transit: self.p_transit.clamp(0.0, 1.0),
            p_slip: self.p_slip.clamp(0.0, 1.0),
            p_guess: self.p_guess.clamp(0.0, 1.0),
            decay_rate: self.decay_rate.max(0.0),
        }
    }
}

/// A named field of a session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Category(String),
}

/// Raw heterogeneous session data as delivered by collaborator services.
///
/// Fields live in a `BTreeMap` so iteration order, and therefore any vector
/// derived from it, is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), FieldValue::Number(value));
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(name.into(), FieldValue::Category(value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// One at-risk skill with a templated recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskArea {
    pub skill_id: String,
    pub risk_level: RiskLevel,
    pub recommendation: String,
}

/// Consolidated prediction for one trainee. Created fresh per orchestration
/// call; persistence is a collaborator concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub trainee_id: String,
    pub predicted_completion_date: Option<DateTime<Utc>>,
    pub predicted_final_score: Option<f64>,
    pub risk_areas: Vec<RiskArea>,
    /// Always within [0, 1]; 0.0 for trainees with no history.
    pub confidence_score: f64,
}

impl PredictionResult {
    /// The expected result for a trainee the engine has never seen.
    pub fn cold_start(trainee_id: impl Into<String>) -> Self {
        Self {
            trainee_id: trainee_id.into(),
            predicted_completion_date: None,
            predicted_final_score: None,
            risk_areas: Vec::new(),
            confidence_score: 0.0,
        }
    }
}

/// Module-completion progress used for completion-date extrapolation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumProgress {
    pub completed_modules: u32,
    pub total_modules: u32,
}

impl CurriculumProgress {
    pub fn remaining_modules(&self) -> u32 {
        self.total_modules.saturating_sub(self.completed_modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bkt_parameters_clamp_to_valid_ranges() {
        let params = BktParameters {
            p_init: 1.4,
            p_transit: -0.2,
            p_slip: 0.5,
            p_guess: 2.0,
            decay_rate: -1.0,
        }
        .clamped();
        assert_eq!(params.p_init, 1.0);
        assert_eq!(params.p_transit, 0.0);
        assert_eq!(params.p_slip, 0.5);
        assert_eq!(params.p_guess, 1.0);
        assert_eq!(params.decay_rate, 0.0);
    }

    #[test]
    fn prediction_result_serializes_camel_case() {
        let result = PredictionResult::cold_start("t-1");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("traineeId").is_some());
        assert!(json.get("predictedCompletionDate").is_some());
        assert!(json["predictedFinalScore"].is_null());
        assert_eq!(json["confidenceScore"], 0.0);
    }

    #[test]
    fn risk_level_serializes_lowercase() {
        let area = RiskArea {
            skill_id: "s-1".to_string(),
            risk_level: RiskLevel::High,
            recommendation: "review".to_string(),
        };
        let json = serde_json::to_value(&area).unwrap();
        assert_eq!(json["riskLevel"], "high");
    }

    #[test]
    fn session_record_fields_iterate_in_name_order() {
        let record = SessionRecord::new()
            .with_number("zeta", 1.0)
            .with_category("alpha", "x")
            .with_number("mid", 2.0);
        let names: Vec<&str> = record.fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn curriculum_remaining_saturates() {
        let progress = CurriculumProgress {
            completed_modules: 12,
            total_modules: 10,
        };
        assert_eq!(progress.remaining_modules(), 0);
    }
}
