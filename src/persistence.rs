//! Parameter persistence.
//!
//! The engine only needs "read and atomically replace a small parameter
//! record". Writes land in a temp file next to the target and are renamed
//! over it, so readers never observe a torn record.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::regression::RegressionMetrics;
use crate::types::BktParameters;

/// The flat record written to disk between process runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedParameters {
    pub bkt: BktParameters,
    pub version: u32,
    pub trained_at: Option<DateTime<Utc>>,
    pub validation: Option<RegressionMetrics>,
}

pub struct ParameterStore {
    path: PathBuf,
}

impl ParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored record, or `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<PersistedParameters>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let params: PersistedParameters = serde_json::from_str(&raw)?;
        Ok(Some(params))
    }

    /// Atomically replaces the stored record.
    pub fn save(&self, params: &PersistedParameters) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("tmp");
        let raw = serde_json::to_string_pretty(params)?;
        fs::write(&tmp_path, raw)?;
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), version = params.version, "parameters saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedParameters {
        PersistedParameters {
            bkt: BktParameters {
                p_init: 0.35,
                decay_rate: 0.015,
                ..BktParameters::default()
            },
            version: 3,
            trained_at: Some(Utc::now()),
            validation: Some(RegressionMetrics {
                mse: 0.01,
                mae: 0.08,
                r2: 0.82,
            }),
        }
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("params.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("params.json"));
        let written = sample();
        store.save(&written).unwrap();

        let read = store.load().unwrap().expect("expected stored parameters");
        assert_eq!(read.version, written.version);
        assert_eq!(read.bkt, written.bkt);
        assert!((read.validation.unwrap().r2 - 0.82).abs() < 1e-12);
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("params.json"));
        store.save(&sample()).unwrap();
        let mut updated = sample();
        updated.version = 4;
        store.save(&updated).unwrap();
        assert_eq!(store.load().unwrap().unwrap().version, 4);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("params.json"));
        store.save(&sample()).unwrap();
        assert!(!dir.path().join("params.tmp").exists());
    }
}
