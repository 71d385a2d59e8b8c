//! Feature preprocessing: raw heterogeneous session records in, fixed-length
//! numeric vectors out.
//!
//! Numeric fields are standardized against statistics captured at fit time;
//! categorical fields are one-hot encoded against a fit-time vocabulary with a
//! trailing "unknown" bucket, so unseen values degrade instead of failing.

use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, Result};
use crate::types::{FieldValue, SessionRecord};

const STD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum FieldStats {
    Numeric { mean: f64, scale: f64 },
    Categorical { vocabulary: Vec<String> },
}

impl FieldStats {
    fn width(&self) -> usize {
        match self {
            Self::Numeric { .. } => 1,
            // One slot per known value plus the unknown bucket.
            Self::Categorical { vocabulary } => vocabulary.len() + 1,
        }
    }
}

/// Immutable fit result. Transforming with the same fitted state and the same
/// record always yields bit-identical vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    fields: Vec<(String, FieldStats)>,
    dim: usize,
}

impl FittedPreprocessor {
    /// Output vector length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Maps one record through the fitted statistics.
    pub fn transform_one(&self, record: &SessionRecord) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.dim);
        for (name, stats) in &self.fields {
            let value = record.fields.get(name).ok_or_else(|| {
                PredictionError::MissingField {
                    context: "feature transform",
                    field: name.clone(),
                }
            })?;
            match (stats, value) {
                (FieldStats::Numeric { mean, scale }, FieldValue::Number(v)) => {
                    if !v.is_finite() {
                        return Err(PredictionError::NonFinite {
                            context: format!("feature transform field `{name}`"),
                        });
                    }
                    out.push((v - mean) / scale);
                }
                (FieldStats::Categorical { vocabulary }, FieldValue::Category(v)) => {
                    let hit = vocabulary.iter().position(|known| known == v);
                    // Unknown values land in the trailing bucket.
                    let slot = hit.unwrap_or(vocabulary.len());
                    for i in 0..=vocabulary.len() {
                        out.push(if i == slot { 1.0 } else { 0.0 });
                    }
                }
                (FieldStats::Numeric { .. }, FieldValue::Category(_)) => {
                    return Err(PredictionError::FieldType {
                        context: "feature transform",
                        field: name.clone(),
                        expected: "numeric",
                    });
                }
                (FieldStats::Categorical { .. }, FieldValue::Number(_)) => {
                    return Err(PredictionError::FieldType {
                        context: "feature transform",
                        field: name.clone(),
                        expected: "categorical",
                    });
                }
            }
        }
        Ok(out)
    }

    /// Maps a batch of records; fails on the first schema violation.
    pub fn transform(&self, records: &[SessionRecord]) -> Result<Vec<Vec<f64>>> {
        records.iter().map(|r| self.transform_one(r)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeaturePreprocessor {
    /// Minimum distinct records before scaling statistics are meaningful.
    pub min_samples: usize,
}

impl FeaturePreprocessor {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(2),
        }
    }

    /// Computes per-field statistics from a batch of historical records.
    ///
    /// The schema is taken from the first record; every other record must
    /// carry exactly the same fields with the same kinds.
    pub fn fit(&self, records: &[SessionRecord]) -> Result<FittedPreprocessor> {
        let needed = self.min_samples.max(2);
        if records.len() < needed {
            return Err(PredictionError::InsufficientData {
                context: "preprocessor fit",
                needed,
                got: records.len(),
            });
        }

        let first = &records[0];
        let mut fields = Vec::with_capacity(first.fields.len());

        for (name, prototype) in &first.fields {
            let stats = match prototype {
                FieldValue::Number(_) => {
                    let values = collect_numeric(records, name)?;
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    let variance = values
                        .iter()
                        .map(|v| (v - mean).powi(2))
                        .sum::<f64>()
                        / values.len() as f64;
                    let std_dev = variance.sqrt();
                    // Degenerate variance: keep the shift, skip the scaling.
                    let scale = if std_dev < STD_EPSILON { 1.0 } else { std_dev };
                    FieldStats::Numeric { mean, scale }
                }
                FieldValue::Category(_) => {
                    let mut vocabulary = collect_categories(records, name)?;
                    vocabulary.sort();
                    vocabulary.dedup();
                    FieldStats::Categorical { vocabulary }
                }
            };
            fields.push((name.clone(), stats));
        }

        let dim = fields.iter().map(|(_, s)| s.width()).sum();
        Ok(FittedPreprocessor { fields, dim })
    }

    /// Fits and transforms in one step; the only entry point used during
    /// training.
    pub fn fit_transform(
        &self,
        records: &[SessionRecord],
    ) -> Result<(FittedPreprocessor, Vec<Vec<f64>>)> {
        let fitted = self.fit(records)?;
        let vectors = fitted.transform(records)?;
        Ok((fitted, vectors))
    }
}

fn collect_numeric(records: &[SessionRecord], name: &str) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(records.len());
    for record in records {
        match record.fields.get(name) {
            Some(FieldValue::Number(v)) if v.is_finite() => values.push(*v),
            Some(FieldValue::Number(_)) => {
                return Err(PredictionError::NonFinite {
                    context: format!("preprocessor fit field `{name}`"),
                })
            }
            Some(FieldValue::Category(_)) => {
                return Err(PredictionError::FieldType {
                    context: "preprocessor fit",
                    field: name.to_string(),
                    expected: "numeric",
                })
            }
            None => {
                return Err(PredictionError::MissingField {
                    context: "preprocessor fit",
                    field: name.to_string(),
                })
            }
        }
    }
    Ok(values)
}

fn collect_categories(records: &[SessionRecord], name: &str) -> Result<Vec<String>> {
    let mut values = Vec::with_capacity(records.len());
    for record in records {
        match record.fields.get(name) {
            Some(FieldValue::Category(v)) => values.push(v.clone()),
            Some(FieldValue::Number(_)) => {
                return Err(PredictionError::FieldType {
                    context: "preprocessor fit",
                    field: name.to_string(),
                    expected: "categorical",
                })
            }
            None => {
                return Err(PredictionError::MissingField {
                    context: "preprocessor fit",
                    field: name.to_string(),
                })
            }
        }
    }
    Ok(values)
}
