//! Integration tests for the per-step numeric pipeline.
//!
//! Exercises: FunctionSpec → behaviour functions → abundance decay →
//! growth → eligibility → transition decision, plus the tracker.
//!
//! All tests are pure logic, no environment field or agent store.

use drifter_logic::constants::DAY_SECS;
use drifter_logic::functions::{
    Body, FunctionSpec, GrowthFunction, LengthAtWeight, MortalityFunction, SwimmingFunction,
};
use drifter_logic::random::{NoNoise, SeededNormal};
use drifter_logic::tracker::{GridPosition, IndexVelocity, ParticleTracker};
use drifter_logic::transition::{
    decay_abundance, is_timed_out, is_transition_eligible, transition_kind, Abundance,
    StageLimits, TransitionKind,
};

// ── Helpers ────────────────────────────────────────────────────────────

fn juvenile_limits() -> StageLimits {
    StageLimits {
        min_stage_duration: 10.0,
        max_stage_duration: 100.0,
        min_size: 20.0,
        stage_transition_rate: 0.1,
    }
}

struct Juvenile {
    age_in_stage: f64,
    body: Body,
    abundance: Abundance,
}

fn run_days(
    j: &mut Juvenile,
    days: usize,
    growth: &GrowthFunction,
    mortality: &MortalityFunction,
    limits: &StageLimits,
) -> Option<usize> {
    let law = LengthAtWeight::default();
    for day in 0..days {
        j.age_in_stage += 1.0;
        let m = mortality.daily_rate(8.0, &mut NoNoise).unwrap();
        j.abundance = decay_abundance(j.abundance, j.age_in_stage, m, limits, DAY_SECS);
        j.body = growth
            .grow(j.body, 8.0, false, 1.0, &law, &mut NoNoise)
            .unwrap();
        if is_transition_eligible(j.age_in_stage, j.body.size, DAY_SECS, limits) {
            return Some(day);
        }
    }
    None
}

// ── Pipeline ───────────────────────────────────────────────────────────

#[test]
fn test_linear_growth_reaches_transition() {
    let growth = GrowthFunction::from_spec(&FunctionSpec::new("linear").with("rate", 1.0)).unwrap();
    let mortality =
        MortalityFunction::from_spec(&FunctionSpec::new("constant").with("rate", 0.01)).unwrap();
    let limits = juvenile_limits();
    let mut j = Juvenile {
        age_in_stage: 0.0,
        body: Body { size: 5.0, weight: 0.0 },
        abundance: Abundance { number: 1000.0, num_trans: 0.0 },
    };
    // size reaches 20 mm on day 15; duration reached on day 10
    let day = run_days(&mut j, 50, &growth, &mortality, &limits).unwrap();
    assert_eq!(day, 14);
    assert!(j.abundance.num_trans > 0.0);
    assert!(j.abundance.number < 1000.0);
    assert_eq!(
        transition_kind(true, true, true, j.abundance.num_trans),
        TransitionKind::Split
    );
}

#[test]
fn test_slow_growth_times_out() {
    let growth = GrowthFunction::from_spec(&FunctionSpec::new("constant").with("rate", 0.01)).unwrap();
    let mortality = MortalityFunction::from_spec(&FunctionSpec::new("houde1989")).unwrap();
    let limits = juvenile_limits();
    let mut j = Juvenile {
        age_in_stage: 0.0,
        body: Body { size: 5.0, weight: 0.0 },
        abundance: Abundance { number: 10.0, num_trans: 0.0 },
    };
    assert!(run_days(&mut j, 101, &growth, &mortality, &limits).is_none());
    assert!(is_timed_out(j.age_in_stage, &limits));
}

#[test]
fn test_consumption_growth_is_deterministic_per_seed() {
    let spec = FunctionSpec::new("consumption").with("stdvCons", 5.0);
    let growth = GrowthFunction::from_spec(&spec).unwrap();
    let law = LengthAtWeight::default();
    let body = Body { size: 0.0, weight: 0.002 };

    let a = growth
        .grow(body, 6.0, true, 1.0, &law, &mut SeededNormal::new(11))
        .unwrap();
    let b = growth
        .grow(body, 6.0, true, 1.0, &law, &mut SeededNormal::new(11))
        .unwrap();
    assert_eq!(a, b);
}

// ── Tracker with a behaviour-driven swim ───────────────────────────────

#[test]
fn test_swim_speed_drives_tracker() {
    let swim = SwimmingFunction::from_spec(
        &FunctionSpec::new("powerLaw")
            .with("coefficient", 0.001)
            .with("exponent", 1.0),
    )
    .unwrap();
    let speed = swim.speed(600.0, 10.0, &mut NoNoise).unwrap();
    // 0.01 m/s over 100 m cells
    let v = IndexVelocity::from_metres([speed, 0.0, 0.0], [100.0, 100.0, 1.0]);
    let mut tracker = ParticleTracker::new(GridPosition::new(5.0, 5.0, 3.0), 10.0);
    for _ in 0..10 {
        tracker.advance(600.0, |_| Ok(v)).unwrap();
    }
    let p = tracker.position();
    assert!((p.i - 5.6).abs() < 1e-9);
    assert_eq!(p.j, 5.0);
    assert_eq!(p.k, 3.0);
}
