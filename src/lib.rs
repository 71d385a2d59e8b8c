//! # skilltrace
//!
//! Trainee performance prediction and skill-decay estimation engine.
//!
//! The crate tracks a per-(trainee, skill) mastery probability that decays
//! over unpracticed time and updates from observed outcomes (a Bayesian
//! knowledge-tracing variant), fits a regression model over heterogeneous
//! session features, and composes both into consolidated predictions:
//! projected completion date, expected final score, per-skill risk areas,
//! and a confidence score.
//!
//! ## Module structure
//!
//! - [`types`] - shared data model and wire shapes
//! - [`features`] - session records to fixed-length numeric vectors
//! - [`mastery`] - knowledge-tracing transitions, parameter fitting, state ownership
//! - [`regression`] - swappable fit/predict/evaluate score estimators
//! - [`engine`] - the prediction orchestrator and retrain lifecycle
//! - [`persistence`] - atomic parameter snapshot on disk
//! - [`config`] - tunable defaults with env overrides
//!
//! Online inference and offline retraining are separate lifecycles: a
//! retrain builds a fresh immutable model snapshot that is swapped in
//! atomically, and per-(trainee, skill) mastery updates are serialized
//! through the tracker.

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod mastery;
pub mod persistence;
pub mod regression;
pub mod types;

pub use config::EngineConfig;
pub use engine::{
    HistoryProvider, InMemoryHistory, PredictionEngine, RetrainOutcome, TrainingCorpus,
};
pub use error::{LowDataWarning, PredictionError};
pub use features::{FeaturePreprocessor, FittedPreprocessor};
pub use mastery::MasteryTracker;
pub use regression::{
    MlpConfig, MlpRegressor, RegressionMetrics, Regressor, RidgeConfig, RidgeRegressor,
};
pub use types::{
    BktParameters, CurriculumProgress, MasteryState, PerformanceRecord, PredictionResult,
    RiskArea, RiskLevel, SessionRecord,
};
