//! Drifter Headless Simulation Harness
//!
//! Validates the numerics and a full scenario run in-process, with no
//! external data files beyond the bundled scenario.
//!
//! Usage:
//!   cargo run -p drifter-simtest
//!   cargo run -p drifter-simtest -- --verbose

use std::collections::HashSet;
use std::sync::Arc;

use drifter_core::components::{AgentState, AttributeRecord};
use drifter_core::config::SimulationConfig;
use drifter_core::engine::SimulationEngine;
use drifter_core::environment::RectilinearField;
use drifter_core::stages::StageRegistry;
use drifter_logic::error::NumericResult;
use drifter_logic::functions::{
    Body, FunctionSpec, GrowthFunction, LengthAtWeight, MortalityFunction, SwimmingFunction,
};
use drifter_logic::random::{NoNoise, RandomSource, SeededNormal};
use drifter_logic::solar;
use drifter_logic::tracker::{GridPosition, IndexVelocity, ParticleTracker};
use drifter_logic::transition::{decay_abundance, Abundance, StageLimits};
use serde::Deserialize;

// ── Scenario (field, stages and releases in one file) ───────────────────
const SCENARIO_JSON: &str = include_str!("../../../data/scenario.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    steps: usize,
    field: RectilinearField,
    simulation: SimulationConfig,
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    stage: String,
    lon: f64,
    lat: f64,
    depth: f64,
    number: f64,
    size: f64,
    count: usize,
    /// Years; carried by stages that declare `maternalAge`.
    #[serde(default)]
    maternal_age: Option<f64>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Drifter Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario validation
    let scenario = validate_scenario(&mut results);

    // 2. Behaviour functions
    results.extend(validate_functions(verbose));

    // 3. Particle tracker
    results.extend(validate_tracker(verbose));

    // 4. Day / night
    results.extend(validate_solar(verbose));

    // 5. Abundance bookkeeping
    results.extend(validate_abundance(verbose));

    // 6. Full scenario run
    if let Some(scenario) = scenario {
        results.extend(validate_scenario_run(&scenario, verbose));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

// ── 1. Scenario ─────────────────────────────────────────────────────────

fn validate_scenario(results: &mut Vec<TestResult>) -> Option<Scenario> {
    println!("--- Scenario ---");

    let scenario: Scenario = match serde_json::from_str(SCENARIO_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(check("scenario_parse", false, format!("JSON parse error: {}", e)));
            return None;
        }
    };

    match StageRegistry::from_config(&scenario.simulation.stages) {
        Ok(stages) => results.push(check(
            "scenario_stages",
            stages.len() == scenario.simulation.stages.len(),
            format!("{} stages: {}", stages.len(), stages.names().collect::<Vec<_>>().join(", ")),
        )),
        Err(e) => {
            results.push(check("scenario_stages", false, e.to_string()));
            return None;
        }
    }

    let unknown: Vec<_> = scenario
        .releases
        .iter()
        .filter(|r| !scenario.simulation.stages.iter().any(|s| s.name == r.stage))
        .map(|r| r.stage.clone())
        .collect();
    results.push(check(
        "scenario_release_stages",
        unknown.is_empty(),
        if unknown.is_empty() {
            format!("{} release groups", scenario.releases.len())
        } else {
            format!("unknown stages: {:?}", unknown)
        },
    ));

    results.push(check(
        "scenario_time_step",
        scenario.simulation.time_step_secs > 0.0 && scenario.steps > 0,
        format!(
            "{} steps of {} s",
            scenario.steps, scenario.simulation.time_step_secs
        ),
    ));

    Some(scenario)
}

// ── 2. Behaviour Functions ──────────────────────────────────────────────

fn validate_functions(verbose: bool) -> Vec<TestResult> {
    println!("--- Behaviour Functions ---");
    let mut results = Vec::new();

    let houde = MortalityFunction::from_spec(&FunctionSpec::new("houde1989"));
    match houde {
        Ok(f) => {
            let cold = f.daily_rate(2.0, &mut NoNoise);
            let warm = f.daily_rate(12.0, &mut NoNoise);
            let ok = matches!((&cold, &warm), (Ok(c), Ok(w)) if *c > 0.0 && w > c);
            results.push(check(
                "mortality_rises_with_temperature",
                ok,
                format!("2°C {:?}, 12°C {:?}", cold, warm),
            ));
        }
        Err(e) => results.push(check("mortality_rises_with_temperature", false, e.to_string())),
    }

    let bad = GrowthFunction::from_spec(&FunctionSpec::new("linear"));
    results.push(check(
        "growth_requires_parameters",
        bad.is_err(),
        "linear growth without a rate is rejected",
    ));

    // consumption growth pays for activity in daylight
    let spec = FunctionSpec::new("consumption");
    let law = LengthAtWeight::default();
    let body = Body {
        size: 6.0,
        weight: 0.001,
    };
    match GrowthFunction::from_spec(&spec) {
        Ok(growth) => {
            let day = growth.grow(body, 6.0, true, 1.0, &law, &mut NoNoise);
            let night = growth.grow(body, 6.0, false, 1.0, &law, &mut NoNoise);
            let ok = matches!((&day, &night), (Ok(d), Ok(n)) if n.weight > d.weight);
            if verbose {
                println!("  consumption day {:?} / night {:?}", day, night);
            }
            results.push(check(
                "consumption_daylight_cost",
                ok,
                "night-time weight gain exceeds daytime",
            ));
        }
        Err(e) => results.push(check("consumption_daylight_cost", false, e.to_string())),
    }

    match SwimmingFunction::from_spec(
        &FunctionSpec::new("powerLaw")
            .with("coefficient", 0.001)
            .with("exponent", 1.0),
    ) {
        Ok(f) => {
            let small = f.speed(3600.0, 5.0, &mut NoNoise).unwrap_or(f64::NAN);
            let large = f.speed(3600.0, 20.0, &mut NoNoise).unwrap_or(f64::NAN);
            results.push(check(
                "swimming_scales_with_size",
                large > small && small > 0.0,
                format!("5 mm {:.4} m/s, 20 mm {:.4} m/s", small, large),
            ));
        }
        Err(e) => results.push(check("swimming_scales_with_size", false, e.to_string())),
    }

    let mut a = SeededNormal::new(99);
    let mut b = SeededNormal::new(99);
    let same = (0..100).all(|_| a.normal_variate() == b.normal_variate());
    results.push(check("random_stream_reproducible", same, "seed 99, 100 draws"));

    results
}

// ── 3. Particle Tracker ─────────────────────────────────────────────────

fn validate_tracker(_verbose: bool) -> Vec<TestResult> {
    println!("--- Particle Tracker ---");
    let mut results = Vec::new();

    let start = GridPosition::new(10.0, 10.0, 5.0);
    let mut tracker = ParticleTracker::new(start, 20.0);
    let forward = tracker.advance(100.0, |_| Ok(IndexVelocity::new(0.01, -0.02, 0.0)));
    let ok = matches!(forward, Ok(p) if (p.i - 11.0).abs() < 1e-12 && (p.j - 8.0).abs() < 1e-12);
    results.push(check(
        "tracker_uniform_flow",
        ok,
        format!("{:?}", forward.map(|p| p.as_array())),
    ));

    // a velocity that varies along i still retraces under reversed time
    let shear = |p: &GridPosition| -> NumericResult<IndexVelocity> {
        Ok(IndexVelocity::new(0.001 * p.j, 0.0005 * p.i, 0.0))
    };
    let mut tracker = ParticleTracker::new(start, 20.0);
    let mut err = 0.0f64;
    for _ in 0..10 {
        let _ = tracker.advance(30.0, shear);
    }
    for _ in 0..10 {
        if let Ok(p) = tracker.advance(-30.0, shear) {
            err = (p.i - start.i).abs().max((p.j - start.j).abs());
        }
    }
    results.push(check(
        "tracker_retrace",
        err < 1e-3,
        format!("max index error after retrace {:.2e}", err),
    ));

    let mut tracker = ParticleTracker::new(GridPosition::new(1.0, 1.0, 19.5), 20.0);
    let surfaced = tracker.advance(10.0, |_| Ok(IndexVelocity::new(0.0, 0.0, 1.0)));
    results.push(check(
        "tracker_clamps_vertical",
        matches!(surfaced, Ok(p) if p.k == 20.0),
        "k held at the surface level",
    ));

    results
}

// ── 4. Solar ────────────────────────────────────────────────────────────

fn validate_solar(_verbose: bool) -> Vec<TestResult> {
    println!("--- Day / Night ---");
    let mut results = Vec::new();

    // equinox, Greenwich meridian
    let noon = solar::day_of_year(79.5 * 86_400.0, 2003);
    let midnight = solar::day_of_year(79.0 * 86_400.0, 2003);
    results.push(check(
        "solar_equinox_noon",
        solar::is_daytime(0.0, 0.0, noon),
        format!("zenith {:.1}°", solar::solar_zenith_deg(0.0, 0.0, noon)),
    ));
    results.push(check(
        "solar_equinox_midnight",
        !solar::is_daytime(0.0, 0.0, midnight),
        format!("zenith {:.1}°", solar::solar_zenith_deg(0.0, 0.0, midnight)),
    ));

    // midsummer far north stays light at local midnight
    let june = solar::day_of_year(171.0 * 86_400.0, 2003);
    results.push(check(
        "solar_polar_day",
        solar::is_daytime(0.0, 78.0, june),
        format!("zenith {:.1}°", solar::solar_zenith_deg(0.0, 78.0, june)),
    ));

    results
}

// ── 5. Abundance ────────────────────────────────────────────────────────

fn validate_abundance(_verbose: bool) -> Vec<TestResult> {
    println!("--- Abundance ---");
    let mut results = Vec::new();

    let limits = StageLimits {
        min_stage_duration: 0.0,
        max_stage_duration: 100.0,
        min_size: 0.0,
        stage_transition_rate: 0.25,
    };
    let mut a = Abundance {
        number: 1000.0,
        num_trans: 0.0,
    };
    let mut monotone = true;
    for _ in 0..240 {
        let next = decay_abundance(a, 1.0, 0.05, &limits, 3600.0);
        monotone &= next.number <= a.number;
        a = next;
    }
    let expected = 1000.0 * (-0.3f64 * 10.0).exp();
    results.push(check(
        "abundance_closed_form",
        monotone && (a.number - expected).abs() < 1e-6 * expected,
        format!("number {:.4}, expected {:.4}", a.number, expected),
    ));
    results.push(check(
        "abundance_pending_bounded",
        a.num_trans > 0.0 && a.num_trans < 1000.0 - a.number,
        format!("numTrans {:.4}", a.num_trans),
    ));

    results
}

// ── 6. Scenario Run ─────────────────────────────────────────────────────

fn release_all(engine: &mut SimulationEngine, releases: &[Release]) -> Result<usize, String> {
    let mut released = 0;
    for r in releases {
        for n in 0..r.count {
            let mut agent = AgentState::new(r.stage.as_str(), 0).at(
                r.lon + 0.02 * n as f64,
                r.lat,
                r.depth,
            );
            agent.number = r.number;
            agent.size = r.size;
            if let Some(age) = r.maternal_age {
                agent = agent.with_attribute("maternalAge", age);
            }
            engine.release(agent).map_err(|e| e.to_string())?;
            released += 1;
        }
    }
    Ok(released)
}

fn validate_scenario_run(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    println!("--- Scenario Run ---");
    let mut results = Vec::new();

    let field = Arc::new(scenario.field.clone());
    let mut engine = match SimulationEngine::new(scenario.simulation.clone(), field) {
        Ok(e) => e,
        Err(e) => {
            results.push(check("run_engine_ready", false, e.to_string()));
            return results;
        }
    };

    match release_all(&mut engine, &scenario.releases) {
        Ok(n) => results.push(check("run_release", n == engine.agent_count(), format!("{} agents placed", n))),
        Err(e) => {
            results.push(check("run_release", false, e));
            return results;
        }
    }

    let dt = scenario.simulation.time_step_secs;
    let mut failures = 0;
    let mut exits = 0;
    let mut abundance_rises = 0;
    let mut successors = 0;
    let mut last_total = engine.total_abundance();
    for step in 0..scenario.steps {
        let report = engine.update(dt);
        failures += report.failures.len();
        exits += report.exited.len();
        successors += report.successors;
        let total = engine.total_abundance();
        if total > last_total * (1.0 + 1e-9) {
            abundance_rises += 1;
        }
        last_total = total;
        if verbose && step % 40 == 0 {
            println!(
                "  t={:>7.2} d  agents {:>5}  active {:>5}  abundance {:.2}",
                engine.sim_time() / 86_400.0,
                engine.agent_count(),
                engine.active_count(),
                total
            );
        }
    }

    results.push(check("run_no_step_failures", failures == 0, format!("{} rejected steps", failures)));
    results.push(check(
        "run_abundance_never_rises",
        abundance_rises == 0,
        format!("final abundance {:.3}", last_total),
    ));
    results.push(check(
        "run_eggs_hatched",
        engine.count_in_stage("Egg") == 0,
        format!("{} eggs left", engine.count_in_stage("Egg")),
    ));
    results.push(check(
        "run_juveniles_recruited",
        engine.count_in_stage("Juvenile") > 0,
        format!(
            "{} juveniles from {} successors, {} exits",
            engine.count_in_stage("Juvenile"),
            successors,
            exits
        ),
    ));

    let agents = engine.agents();
    let floating: Vec<u64> = agents
        .iter()
        .filter(|a| a.active && a.type_name == "Juvenile")
        .filter(|a| a.grid_position.map_or(true, |p| p.k != 0.0))
        .map(|a| a.id)
        .collect();
    results.push(check(
        "run_juveniles_on_bottom",
        floating.is_empty(),
        format!("{} juveniles off the bottom", floating.len()),
    ));

    let larvae: Vec<&AgentState> = agents
        .iter()
        .filter(|a| a.alive && a.type_name == "Larva")
        .collect();
    let without_ogv = larvae
        .iter()
        .filter(|a| !a.stage_attributes.get("oilGlobuleVolume").map_or(false, |v| v.is_finite()))
        .count();
    results.push(check(
        "run_larvae_carry_ogv",
        without_ogv == 0,
        format!("{} of {} living larvae without an oil globule volume", without_ogv, larvae.len()),
    ));

    let mut seen = HashSet::new();
    let duplicate = agents.iter().filter(|a| a.active).any(|a| !seen.insert(a.id));
    results.push(check("run_active_ids_unique", !duplicate, format!("{} active", seen.len())));

    // every committed row reads back into the agent it came from
    let schema = engine.schema().clone();
    let mismatched = agents
        .iter()
        .filter(|a| {
            let row = AttributeRecord::from_agent(schema.clone(), a).to_row();
            AttributeRecord::from_row(schema.clone(), &row)
                .and_then(|r| r.to_agent())
                .map_or(true, |back| &back != *a)
        })
        .count();
    results.push(check(
        "run_rows_round_trip",
        mismatched == 0,
        format!("{} of {} rows differ", mismatched, agents.len()),
    ));

    let mut buf = Vec::new();
    let restored = engine.save(&mut buf).and_then(|_| {
        let mut copy = SimulationEngine::new(
            scenario.simulation.clone(),
            Arc::new(scenario.field.clone()),
        )?;
        copy.load(buf.as_slice())?;
        Ok(copy)
    });
    match restored {
        Ok(copy) => results.push(check(
            "run_checkpoint_round_trip",
            copy.report_rows() == engine.report_rows() && copy.sim_time() == engine.sim_time(),
            format!("{} bytes", buf.len()),
        )),
        Err(e) => results.push(check("run_checkpoint_round_trip", false, e.to_string())),
    }

    results
}
