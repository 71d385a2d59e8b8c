//! Knowledge-tracing transitions.
//!
//! A single continuous mastery probability per (trainee, skill), with two
//! pure operations: exponential decay over unpracticed time and a Bayesian
//! slip/guess update from an observed outcome. Decay must always be applied
//! up to "now" before observing a new outcome.

use crate::types::BktParameters;

const DENOMINATOR_EPSILON: f64 = 1e-12;

/// Erodes mastery over `days_since_practice` days of no practice.
///
/// Identity at zero days; monotone non-increasing in elapsed time.
pub fn decay(mastery: f64, days_since_practice: f64, params: &BktParameters) -> f64 {
    let mastery = mastery.clamp(0.0, 1.0);
    let days = days_since_practice.max(0.0);
    (mastery * (-params.decay_rate * days).exp()).clamp(0.0, 1.0)
}

/// Folds one observed outcome into the prior mastery estimate.
///
/// Posterior from slip/guess evidence, then the learning step
/// `posterior + (1 - posterior) * p_transit`. A vanishing denominator (only
/// reachable with boundary priors combined with boundary slip/guess) returns
/// the prior unchanged rather than dividing by zero.
pub fn observe(prior_mastery: f64, correct: bool, params: &BktParameters) -> f64 {
    let prior = prior_mastery.clamp(0.0, 1.0);

    let (numerator, denominator) = if correct {
        let n = prior * (1.0 - params.p_slip);
        (n, n + (1.0 - prior) * params.p_guess)
    } else {
        let n = prior * params.p_slip;
        (n, n + (1.0 - prior) * (1.0 - params.p_guess))
    };

    if denominator.abs() < DENOMINATOR_EPSILON {
        return prior;
    }

    let posterior = (numerator / denominator).clamp(0.0, 1.0);
    (posterior + (1.0 - posterior) * params.p_transit).clamp(0.0, 1.0)
}

/// Decay-then-observe, the required ordering for a new performance record.
pub fn advance(
    mastery: f64,
    days_since_practice: f64,
    correct: bool,
    params: &BktParameters,
) -> f64 {
    let decayed = decay(mastery, days_since_practice, params);
    observe(decayed, correct, params)
}
