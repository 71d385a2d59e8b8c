//! Per-(trainee, skill) mastery state ownership.
//!
//! The tracker is the only mutator of `MasteryState`. Updates for one
//! (trainee, skill) pair are serialized through a per-key mutex since
//! decay-then-observe is not commutative across interleaved calls; different
//! pairs update fully independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::mastery::bkt;
use crate::types::{BktParameters, MasteryState, PerformanceRecord};

type Key = (String, String);

pub struct MasteryTracker {
    params: RwLock<BktParameters>,
    states: RwLock<HashMap<Key, Arc<Mutex<MasteryState>>>>,
}

impl MasteryTracker {
    pub fn new(params: BktParameters) -> Self {
        Self {
            params: RwLock::new(params),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Swaps in newly fitted parameters; existing states are untouched and
    /// pick up the new rates on their next operation.
    pub fn set_parameters(&self, params: BktParameters) {
        *self.params.write() = params.clamped();
    }

    pub fn parameters(&self) -> BktParameters {
        *self.params.read()
    }

    /// Folds one performance record into the pair's state: decay over the
    /// record's practice gap first, then the observation update.
    pub fn apply(&self, record: &PerformanceRecord) -> MasteryState {
        let params = self.parameters();
        let entry = self.entry_for(&record.trainee_id, &record.skill_id, &params);

        let mut state = entry.lock();
        state.mastery = bkt::advance(
            state.mastery,
            record.time_since_last_practice_days,
            record.is_correct(),
            &params,
        );
        state.last_updated = record.timestamp;
        state.clone()
    }

    /// Current mastery decayed to `now`, without mutating stored state.
    pub fn mastery_at(&self, trainee_id: &str, skill_id: &str, now: DateTime<Utc>) -> Option<f64> {
        let key = (trainee_id.to_string(), skill_id.to_string());
        let entry = self.states.read().get(&key).cloned()?;
        let params = self.parameters();
        let state = entry.lock();
        Some(decayed_to(&state, now, &params))
    }

    /// Snapshot of every tracked skill for a trainee, each decayed to `now`.
    pub fn states_for(&self, trainee_id: &str, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let params = self.parameters();
        let entries: Vec<(String, Arc<Mutex<MasteryState>>)> = self
            .states
            .read()
            .iter()
            .filter(|((trainee, _), _)| trainee == trainee_id)
            .map(|((_, skill), entry)| (skill.clone(), Arc::clone(entry)))
            .collect();

        let mut snapshot: Vec<(String, f64)> = entries
            .into_iter()
            .map(|(skill, entry)| {
                let state = entry.lock();
                (skill, decayed_to(&state, now, &params))
            })
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    pub fn has_trainee(&self, trainee_id: &str) -> bool {
        self.states
            .read()
            .keys()
            .any(|(trainee, _)| trainee == trainee_id)
    }

    /// Replays a history of records in timestamp order. Used to seed the
    /// tracker for trainees whose history predates this process.
    pub fn replay(&self, records: &[PerformanceRecord]) {
        let mut ordered: Vec<&PerformanceRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);
        for record in ordered {
            self.apply(record);
        }
    }

    fn entry_for(
        &self,
        trainee_id: &str,
        skill_id: &str,
        params: &BktParameters,
    ) -> Arc<Mutex<MasteryState>> {
        let key = (trainee_id.to_string(), skill_id.to_string());
        if let Some(entry) = self.states.read().get(&key) {
            return Arc::clone(entry);
        }
        let mut states = self.states.write();
        Arc::clone(states.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(MasteryState {
                trainee_id: trainee_id.to_string(),
                skill_id: skill_id.to_string(),
                mastery: params.p_init.clamp(0.0, 1.0),
                last_updated: Utc::now(),
            }))
        }))
    }
}

fn decayed_to(state: &MasteryState, now: DateTime<Utc>, params: &BktParameters) -> f64 {
    let elapsed_days = (now - state.last_updated).num_seconds().max(0) as f64 / 86_400.0;
    bkt::decay(state.mastery, elapsed_days, params)
}
