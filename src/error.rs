use thiserror::Error;

/// Errors surfaced at component boundaries.
///
/// Data-sufficiency problems are recoverable by caller policy; shape and
/// numeric-hygiene problems are fatal and must be surfaced unchanged.
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error("insufficient data for {context}: needed {needed}, got {got}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("non-finite value in {context}")]
    NonFinite { context: String },

    #[error("missing field `{field}` in {context}")]
    MissingField { context: &'static str, field: String },

    #[error("field `{field}` in {context} is not {expected}")]
    FieldType {
        context: &'static str,
        field: String,
        expected: &'static str,
    },

    #[error("{0} used before fit")]
    NotFitted(&'static str),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for PredictionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PredictionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

/// Non-fatal signal that heuristic parameter estimation ran on too little
/// data and fell back to defaults. Propagated as an annotation, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowDataWarning {
    pub records_seen: usize,
    pub records_needed: usize,
}

pub type Result<T> = std::result::Result<T, PredictionError>;

/// Rejects NaN/Inf at a component boundary.
pub fn ensure_finite(value: f64, context: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictionError::NonFinite {
            context: context.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_passes_normal_values() {
        assert!(ensure_finite(0.5, "x").is_ok());
        assert!(ensure_finite(-1e9, "x").is_ok());
    }

    #[test]
    fn ensure_finite_rejects_nan_and_inf() {
        assert!(ensure_finite(f64::NAN, "x").is_err());
        assert!(ensure_finite(f64::INFINITY, "x").is_err());
        assert!(ensure_finite(f64::NEG_INFINITY, "x").is_err());
    }

    #[test]
    fn error_messages_name_the_context() {
        let err = PredictionError::DimensionMismatch {
            context: "regressor fit",
            expected: 4,
            got: 3,
        };
        assert!(err.to_string().contains("regressor fit"));
    }
}
