//! Prediction orchestration.
//!
//! Composes the preprocessor, the mastery tracker, and a fitted regressor
//! into consolidated per-trainee predictions, and owns the offline retrain
//! lifecycle. Model artifacts live in an immutable snapshot behind an
//! `RwLock<Arc<..>>`: readers clone the `Arc`, a retrain publishes a whole
//! new snapshot, and nothing is ever mutated in place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::error::{LowDataWarning, PredictionError, Result};
use crate::features::{FeaturePreprocessor, FittedPreprocessor};
use crate::mastery::{fit_parameters, MasteryTracker};
use crate::regression::{RegressionMetrics, Regressor};
use crate::types::{
    BktParameters, CurriculumProgress, PerformanceRecord, PredictionResult, RiskArea, RiskLevel,
    SessionRecord,
};

/// Collaborator seam: where trainee history actually lives (assessment and
/// syllabus services) is not the engine's concern.
pub trait HistoryProvider: Send + Sync {
    fn performance_history(&self, trainee_id: &str) -> Vec<PerformanceRecord>;
    fn latest_session(&self, trainee_id: &str) -> Option<SessionRecord>;
    fn curriculum_progress(&self, trainee_id: &str) -> CurriculumProgress;
}

/// Simple in-process provider, used by tests and by hosts that already hold
/// the data in memory.
#[derive(Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<PerformanceRecord>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    progress: RwLock<HashMap<String, CurriculumProgress>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_record(&self, record: PerformanceRecord) {
        self.records.write().push(record);
    }

    pub fn set_session(&self, trainee_id: impl Into<String>, session: SessionRecord) {
        self.sessions.write().insert(trainee_id.into(), session);
    }

    pub fn set_progress(&self, trainee_id: impl Into<String>, progress: CurriculumProgress) {
        self.progress.write().insert(trainee_id.into(), progress);
    }
}

impl HistoryProvider for InMemoryHistory {
    fn performance_history(&self, trainee_id: &str) -> Vec<PerformanceRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.trainee_id == trainee_id)
            .cloned()
            .collect()
    }

    fn latest_session(&self, trainee_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(trainee_id).cloned()
    }

    fn curriculum_progress(&self, trainee_id: &str) -> CurriculumProgress {
        self.progress
            .read()
            .get(trainee_id)
            .copied()
            .unwrap_or_default()
    }
}

/// Immutable bundle of fitted model artifacts.
pub struct ModelSnapshot {
    pub preprocessor: Option<FittedPreprocessor>,
    pub regressor: Option<Box<dyn Regressor>>,
    pub bkt: BktParameters,
    pub validation: Option<RegressionMetrics>,
    pub version: u32,
    pub trained_at: Option<DateTime<Utc>>,
}

impl ModelSnapshot {
    fn initial(bkt: BktParameters) -> Self {
        Self {
            preprocessor: None,
            regressor: None,
            bkt,
            validation: None,
            version: 0,
            trained_at: None,
        }
    }
}

/// Offline training input: performance records for the knowledge-tracing fit
/// plus paired session records and score targets for the regressor.
pub struct TrainingCorpus {
    pub records: Vec<PerformanceRecord>,
    pub sessions: Vec<SessionRecord>,
    pub targets: Vec<f64>,
}

/// What a retrain attempt did.
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub adopted: bool,
    pub validation: RegressionMetrics,
    pub bkt_warning: Option<LowDataWarning>,
    pub version: u32,
}

pub struct PredictionEngine {
    config: EngineConfig,
    provider: Arc<dyn HistoryProvider>,
    tracker: MasteryTracker,
    snapshot: RwLock<Arc<ModelSnapshot>>,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn HistoryProvider>) -> Self {
        let bkt = config.bkt_defaults.clamped();
        Self {
            config,
            provider,
            tracker: MasteryTracker::new(bkt),
            snapshot: RwLock::new(Arc::new(ModelSnapshot::initial(bkt))),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Folds one live performance record into the mastery state.
    pub fn ingest(&self, record: &PerformanceRecord) {
        self.tracker.apply(record);
    }

    /// Consolidated prediction for one trainee as of `now`.
    ///
    /// A trainee with no history gets the cold-start result, not an error.
    pub fn predict_for_trainee(&self, trainee_id: &str, now: DateTime<Utc>) -> Result<PredictionResult> {
        let history = self.provider.performance_history(trainee_id);
        if history.is_empty() {
            tracing::debug!(trainee_id, "no history, returning cold-start result");
            return Ok(PredictionResult::cold_start(trainee_id));
        }

        if !self.tracker.has_trainee(trainee_id) {
            self.tracker.replay(&history);
        }
        let mastery = self.tracker.states_for(trainee_id, now);
        let mean_mastery = if mastery.is_empty() {
            self.config.bkt_defaults.p_init
        } else {
            mastery.iter().map(|(_, m)| m).sum::<f64>() / mastery.len() as f64
        };

        let regressor_estimate = self.regressor_estimate(trainee_id)?;

        let blend = self.config.blend.normalized();
        let final_score = match regressor_estimate {
            Some(estimate) => blend.regressor * estimate + blend.mastery * mean_mastery,
            None => mean_mastery,
        }
        .clamp(0.0, 1.0);

        let risk_areas = self.classify_risks(&mastery);
        let completion_date = self.extrapolate_completion(trainee_id, &history, now);
        let confidence = self.confidence_score(&history);

        Ok(PredictionResult {
            trainee_id: trainee_id.to_string(),
            predicted_completion_date: completion_date,
            predicted_final_score: Some(final_score),
            risk_areas,
            confidence_score: confidence,
        })
    }

    /// Fits a full set of model artifacts offline and adopts them only if
    /// validation quality does not regress past the configured floor.
    pub fn retrain(
        &self,
        corpus: &TrainingCorpus,
        mut regressor: Box<dyn Regressor>,
    ) -> Result<RetrainOutcome> {
        if corpus.sessions.len() != corpus.targets.len() {
            return Err(PredictionError::DimensionMismatch {
                context: "retrain corpus",
                expected: corpus.sessions.len(),
                got: corpus.targets.len(),
            });
        }

        let bkt_fit = fit_parameters(
            &corpus.records,
            self.config.bkt_defaults,
            self.config.limits.min_bkt_records,
        );

        let preprocessor = FeaturePreprocessor::new(self.config.limits.min_scaling_samples);
        let (fitted, vectors) = preprocessor.fit_transform(&corpus.sessions)?;

        let (train_x, train_y, val_x, val_y) = holdout_split(&vectors, &corpus.targets);
        regressor.fit(&train_x, &train_y)?;
        let validation = regressor.evaluate(&val_x, &val_y)?;

        let previous = self.snapshot();
        if let Some(live) = previous.validation {
            if validation.r2 < live.r2 - self.config.r2_regression_floor {
                tracing::warn!(
                    new_r2 = validation.r2,
                    live_r2 = live.r2,
                    "retrained model regressed, keeping live snapshot"
                );
                return Ok(RetrainOutcome {
                    adopted: false,
                    validation,
                    bkt_warning: bkt_fit.warning,
                    version: previous.version,
                });
            }
        }

        let version = previous.version + 1;
        let next = Arc::new(ModelSnapshot {
            preprocessor: Some(fitted),
            regressor: Some(regressor),
            bkt: bkt_fit.params,
            validation: Some(validation),
            version,
            trained_at: Some(Utc::now()),
        });

        self.tracker.set_parameters(bkt_fit.params);
        *self.snapshot.write() = next;

        tracing::info!(version, r2 = validation.r2, "adopted retrained model snapshot");
        Ok(RetrainOutcome {
            adopted: true,
            validation,
            bkt_warning: bkt_fit.warning,
            version,
        })
    }

    /// Re-applies externally persisted parameters (service restart path).
    pub fn restore_bkt_parameters(&self, params: BktParameters) {
        let params = params.clamped();
        self.tracker.set_parameters(params);
        let previous = self.snapshot();
        *self.snapshot.write() = Arc::new(ModelSnapshot {
            preprocessor: None,
            regressor: None,
            bkt: params,
            validation: previous.validation,
            version: previous.version,
            trained_at: previous.trained_at,
        });
    }

    pub fn bkt_parameters(&self) -> BktParameters {
        self.tracker.parameters()
    }

    fn regressor_estimate(&self, trainee_id: &str) -> Result<Option<f64>> {
        let snapshot = self.snapshot();
        let (Some(preprocessor), Some(regressor)) =
            (&snapshot.preprocessor, &snapshot.regressor)
        else {
            return Ok(None);
        };
        let Some(session) = self.provider.latest_session(trainee_id) else {
            return Ok(None);
        };
        let vector = preprocessor.transform_one(&session)?;
        let estimate = regressor.predict(&vector)?;
        Ok(Some(estimate))
    }

    fn classify_risks(&self, mastery: &[(String, f64)]) -> Vec<RiskArea> {
        mastery
            .iter()
            .map(|(skill_id, value)| {
                let risk_level = if *value < self.config.risk.high {
                    RiskLevel::High
                } else if *value < self.config.risk.medium {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                };
                RiskArea {
                    skill_id: skill_id.clone(),
                    risk_level,
                    recommendation: recommendation_for(risk_level, skill_id),
                }
            })
            .collect()
    }

    /// Linear projection of remaining modules against the observed
    /// completion rate over the trainee's history span.
    fn extrapolate_completion(
        &self,
        trainee_id: &str,
        history: &[PerformanceRecord],
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let progress = self.provider.curriculum_progress(trainee_id);
        if progress.total_modules == 0 {
            return None;
        }
        if progress.remaining_modules() == 0 {
            return Some(now);
        }
        if progress.completed_modules == 0 {
            return None;
        }

        let first = history.iter().map(|r| r.timestamp).min()?;
        let last = history.iter().map(|r| r.timestamp).max()?;
        let span_days = (last - first).num_seconds().max(0) as f64 / 86_400.0;
        if span_days <= 0.0 {
            return None;
        }

        let rate_per_day = progress.completed_modules as f64 / span_days;
        let days_remaining = progress.remaining_modules() as f64 / rate_per_day;
        Some(now + Duration::seconds((days_remaining * 86_400.0) as i64))
    }

    /// More history and steadier recent performance mean more confidence.
    fn confidence_score(&self, history: &[PerformanceRecord]) -> f64 {
        let count_factor =
            (history.len() as f64 / self.config.confidence_saturation.max(1) as f64).min(1.0);

        let mut recent: Vec<&PerformanceRecord> = history.iter().collect();
        recent.sort_by_key(|r| r.timestamp);
        let window: Vec<f64> = recent
            .iter()
            .rev()
            .take(self.config.confidence_window.max(1))
            .map(|r| r.performance)
            .collect();

        let variance = if window.len() < 2 {
            0.0
        } else {
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / window.len() as f64
        };
        // 0.25 is the variance ceiling for outcomes bounded to [0, 1].
        let stability_factor = 1.0 - (variance / 0.25).min(1.0);

        (count_factor * stability_factor).clamp(0.0, 1.0)
    }
}

fn recommendation_for(level: RiskLevel, skill_id: &str) -> String {
    match level {
        RiskLevel::High => format!(
            "Schedule an instructor-led refresher for {skill_id} before the next evaluation"
        ),
        RiskLevel::Medium => {
            format!("Add focused practice repetitions for {skill_id} to upcoming sessions")
        }
        RiskLevel::Low => format!("Maintain the current practice cadence for {skill_id}"),
    }
}

/// Deterministic 80/20 holdout: every fifth row goes to validation. Corpora
/// too small to spare a holdout validate on the training rows.
fn holdout_split(
    vectors: &[Vec<f64>],
    targets: &[f64],
) -> (Vec<Vec<f64>>, Vec<f64>, Vec<Vec<f64>>, Vec<f64>) {
    if vectors.len() < 10 {
        return (
            vectors.to_vec(),
            targets.to_vec(),
            vectors.to_vec(),
            targets.to_vec(),
        );
    }
    let mut train_x = Vec::new();
    let mut train_y = Vec::new();
    let mut val_x = Vec::new();
    let mut val_y = Vec::new();
    for (i, (x, y)) in vectors.iter().zip(targets).enumerate() {
        if i % 5 == 4 {
            val_x.push(x.clone());
            val_y.push(*y);
        } else {
            train_x.push(x.clone());
            train_y.push(*y);
        }
    }
    (train_x, train_y, val_x, val_y)
}
