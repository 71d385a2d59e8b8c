//! Property-based tests for the knowledge-tracing transitions.
//!
//! Invariants under test:
//! - Decay identity at zero elapsed days and monotonicity in elapsed time
//! - Decay and observe always stay inside [0, 1], boundary priors included
//! - Correct evidence never ranks below incorrect evidence for the same prior
//! - Parameter records survive a JSON round trip

use proptest::prelude::*;

use skilltrace::mastery::bkt;
use skilltrace::BktParameters;

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_days() -> impl Strategy<Value = f64> {
    (0u64..=365_000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_params() -> impl Strategy<Value = BktParameters> {
    (arb_unit(), arb_unit(), arb_unit(), arb_unit(), arb_days()).prop_map(
        |(p_init, p_transit, p_slip, p_guess, decay_days)| BktParameters {
            p_init,
            p_transit,
            p_slip,
            p_guess,
            decay_rate: decay_days / 365.0,
        },
    )
}

/// Parameters away from the degenerate boundaries, where the strict update
/// ordering is guaranteed.
fn arb_interior_params() -> impl Strategy<Value = BktParameters> {
    (
        (1u64..=490u64).prop_map(|v| v as f64 / 1000.0), // p_slip in (0, 0.49]
        (1u64..=490u64).prop_map(|v| v as f64 / 1000.0), // p_guess in (0, 0.49]
        arb_unit(),
    )
        .prop_map(|(p_slip, p_guess, p_transit)| BktParameters {
            p_slip,
            p_guess,
            p_transit,
            ..BktParameters::default()
        })
}

proptest! {
    #[test]
    fn decay_identity_at_zero_days(mastery in arb_unit(), params in arb_params()) {
        prop_assert_eq!(bkt::decay(mastery, 0.0, &params), mastery);
    }

    #[test]
    fn decay_is_monotone_in_days(
        mastery in arb_unit(),
        days1 in arb_days(),
        extra in arb_days(),
        params in arb_params(),
    ) {
        let days2 = days1 + extra;
        prop_assert!(bkt::decay(mastery, days2, &params) <= bkt::decay(mastery, days1, &params));
    }

    #[test]
    fn decay_never_increases_mastery(
        mastery in arb_unit(),
        days in arb_days(),
        params in arb_params(),
    ) {
        let decayed = bkt::decay(mastery, days, &params);
        prop_assert!(decayed <= mastery);
        prop_assert!((0.0..=1.0).contains(&decayed));
    }

    #[test]
    fn observe_stays_in_unit_interval(
        prior in arb_unit(),
        correct in any::<bool>(),
        params in arb_params(),
    ) {
        let updated = bkt::observe(prior, correct, &params);
        prop_assert!((0.0..=1.0).contains(&updated), "got {}", updated);
    }

    #[test]
    fn observe_handles_boundary_priors(
        correct in any::<bool>(),
        params in arb_params(),
    ) {
        for prior in [0.0, 1.0] {
            let updated = bkt::observe(prior, correct, &params);
            prop_assert!((0.0..=1.0).contains(&updated));
        }
    }

    #[test]
    fn correct_evidence_outranks_incorrect(
        prior in (1u64..=999u64).prop_map(|v| v as f64 / 1000.0),
        params in arb_interior_params(),
    ) {
        let up = bkt::observe(prior, true, &params);
        let down = bkt::observe(prior, false, &params);
        prop_assert!(up > down, "up {} down {}", up, down);
    }

    #[test]
    fn correct_posterior_bounded_below_by_slip_complement(
        prior in arb_unit(),
        params in arb_interior_params(),
    ) {
        // The learning step only adds mastery, so the result can never fall
        // under the slip-discounted prior evidence.
        let updated = bkt::observe(prior, true, &params);
        prop_assert!(updated >= prior * (1.0 - params.p_slip) - 1e-12);
    }

    #[test]
    fn advance_equals_decay_then_observe(
        mastery in arb_unit(),
        days in arb_days(),
        correct in any::<bool>(),
        params in arb_params(),
    ) {
        let expected = bkt::observe(bkt::decay(mastery, days, &params), correct, &params);
        prop_assert_eq!(bkt::advance(mastery, days, correct, &params), expected);
    }

    #[test]
    fn parameters_round_trip_through_json(params in arb_params()) {
        let json = serde_json::to_string(&params).unwrap();
        let back: BktParameters = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(params, back);
    }
}
