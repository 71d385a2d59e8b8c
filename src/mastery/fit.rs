//! Heuristic estimation of knowledge-tracing parameters from a record corpus.
//!
//! Deliberately not EM: `p_init` comes from first-attempt outcomes and
//! `decay_rate` from observed performance drops over elapsed time. Slip,
//! guess, and transit keep their configured defaults.

use std::collections::HashMap;

use crate::error::LowDataWarning;
use crate::types::{BktParameters, PerformanceRecord};

/// Fit outcome: estimated parameters plus an optional low-data annotation.
#[derive(Debug, Clone)]
pub struct BktFit {
    pub params: BktParameters,
    pub warning: Option<LowDataWarning>,
}

/// Estimates `p_init` and `decay_rate` from history, keeping `defaults` for
/// everything else. Below `min_records` the defaults are returned untouched
/// together with a `LowDataWarning`.
pub fn fit_parameters(
    records: &[PerformanceRecord],
    defaults: BktParameters,
    min_records: usize,
) -> BktFit {
    if records.len() < min_records {
        tracing::warn!(
            records_seen = records.len(),
            records_needed = min_records,
            "too few records for parameter estimation, keeping defaults"
        );
        return BktFit {
            params: defaults,
            warning: Some(LowDataWarning {
                records_seen: records.len(),
                records_needed: min_records,
            }),
        };
    }

    let mut by_pair: HashMap<(&str, &str), Vec<&PerformanceRecord>> = HashMap::new();
    for record in records {
        by_pair
            .entry((record.trainee_id.as_str(), record.skill_id.as_str()))
            .or_default()
            .push(record);
    }
    for sequence in by_pair.values_mut() {
        sequence.sort_by_key(|r| r.timestamp);
    }

    // p_init: mean first-attempt performance per skill, averaged across skills.
    let mut first_attempts: HashMap<&str, (f64, usize)> = HashMap::new();
    for (&(_, skill_id), sequence) in &by_pair {
        if let Some(first) = sequence.first() {
            let slot = first_attempts.entry(skill_id).or_insert((0.0, 0));
            slot.0 += first.performance;
            slot.1 += 1;
        }
    }
    let p_init = if first_attempts.is_empty() {
        defaults.p_init
    } else {
        let per_skill: f64 = first_attempts
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .sum();
        per_skill / first_attempts.len() as f64
    };

    // decay_rate: average drop over average gap, for consecutive practices of
    // the same pair where time actually passed and performance actually fell.
    let mut drop_sum = 0.0;
    let mut days_sum = 0.0;
    let mut pair_count = 0usize;
    for sequence in by_pair.values() {
        for window in sequence.windows(2) {
            let (earlier, later) = (window[0], window[1]);
            let elapsed = later.time_since_last_practice_days;
            let drop = earlier.performance - later.performance;
            if elapsed > 0.0 && drop > 0.0 {
                drop_sum += drop;
                days_sum += elapsed;
                pair_count += 1;
            }
        }
    }
    let decay_rate = if pair_count == 0 || days_sum <= 0.0 {
        defaults.decay_rate
    } else {
        (drop_sum / pair_count as f64) / (days_sum / pair_count as f64)
    };

    let params = BktParameters {
        p_init,
        decay_rate,
        ..defaults
    }
    .clamped();

    tracing::info!(
        records = records.len(),
        p_init = params.p_init,
        decay_rate = params.decay_rate,
        qualifying_pairs = pair_count,
        "estimated knowledge-tracing parameters"
    );

    BktFit {
        params,
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(
        trainee: &str,
        skill: &str,
        day: i64,
        performance: f64,
        gap_days: f64,
    ) -> PerformanceRecord {
        PerformanceRecord {
            trainee_id: trainee.to_string(),
            skill_id: skill.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::days(day),
            performance,
            time_since_last_practice_days: gap_days,
        }
    }

    #[test]
    fn low_data_keeps_defaults_and_warns() {
        let defaults = BktParameters::default();
        let records = vec![record("t1", "s1", 0, 1.0, 0.0)];
        let fit = fit_parameters(&records, defaults, 10);
        assert_eq!(fit.params, defaults);
        let warning = fit.warning.expect("expected low-data warning");
        assert_eq!(warning.records_seen, 1);
        assert_eq!(warning.records_needed, 10);
    }

    #[test]
    fn p_init_averages_first_attempts_across_skills() {
        let defaults = BktParameters::default();
        let mut records = Vec::new();
        // Skill a: first attempts 1.0 and 0.0 -> mean 0.5; skill b: 1.0.
        records.push(record("t1", "a", 0, 1.0, 0.0));
        records.push(record("t2", "a", 0, 0.0, 0.0));
        records.push(record("t1", "b", 0, 1.0, 0.0));
        // Padding so the corpus clears the minimum without adding first attempts.
        for day in 1..=7 {
            records.push(record("t1", "a", day, 1.0, 1.0));
        }
        let fit = fit_parameters(&records, defaults, 10);
        assert!(fit.warning.is_none());
        assert!((fit.params.p_init - 0.75).abs() < 1e-12);
    }

    #[test]
    fn decay_rate_recovers_synthetic_rate_within_tolerance() {
        let defaults = BktParameters::default();
        let true_rate = 0.02;
        let gap = 5.0;
        let mut records = Vec::new();
        for (t_idx, trainee) in ["t1", "t2"].iter().enumerate() {
            let mut performance = 1.0;
            for step in 0..6 {
                let day = (t_idx * 100 + step * 5) as i64;
                let gap_days = if step == 0 { 0.0 } else { gap };
                records.push(record(trainee, "s1", day, performance, gap_days));
                performance *= (-true_rate * gap).exp();
            }
        }
        let fit = fit_parameters(&records, defaults, 10);
        assert!(fit.warning.is_none());
        let estimated = fit.params.decay_rate;
        assert!(
            estimated > true_rate * 0.5 && estimated < true_rate * 1.5,
            "estimated {estimated}, true {true_rate}"
        );
    }

    #[test]
    fn flat_performance_keeps_default_decay_rate() {
        let defaults = BktParameters::default();
        let records: Vec<_> = (0..12)
            .map(|day| record("t1", "s1", day, 0.8, 1.0))
            .collect();
        let fit = fit_parameters(&records, defaults, 10);
        assert_eq!(fit.params.decay_rate, defaults.decay_rate);
    }
}
