//! Integration tests for whole-population updates: batches, failures,
//! parallel stepping, persistence and row ingestion.

mod common;

use common::*;
use drifter_core::components::{keys, AgentState, AttributeRecord};
use drifter_core::error::DriftError;
use drifter_core::engine::SimulationEngine;
use drifter_logic::error::ConfigError;
use drifter_logic::functions::FunctionSpec;

fn spread(sim: &mut SimulationEngine, type_name: &str, n: usize) {
    for i in 0..n {
        let lon = -169.0 + 0.07 * i as f64;
        let lat = 54.5 + 0.03 * (i % 40) as f64;
        sim.release(AgentState::new(type_name, 0).at(lon, lat, 5.0 + i as f64 % 60.0))
            .unwrap();
    }
}

// ── Batches ────────────────────────────────────────────────────────────

#[test]
fn test_update_advances_clock() {
    let mut sim = simulation(flowing([0.02, 0.01, 0.0]), vec![stage("Egg")]);
    spread(&mut sim, "Egg", 10);
    let report = sim.run(6);
    assert_eq!(report.stepped, 60);
    assert!(report.failures.is_empty());
    assert_eq!(sim.step_count(), 6);
    assert_eq!(sim.sim_time(), 6.0 * 3600.0);
    for a in sim.agents() {
        assert_eq!(a.time, 6.0 * 3600.0);
        assert_eq!(a.track.len(), 7);
    }
}

#[test]
fn test_release_assigns_fresh_ids() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    let kept = sim
        .release(AgentState::new("Egg", 40).at(-168.0, 55.0, 10.0))
        .unwrap();
    let fresh = sim
        .release(AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0))
        .unwrap();
    assert_eq!(kept, 40);
    assert_eq!(fresh, 41);
    let a = &sim.agents()[1];
    assert_eq!((a.id, a.parent_id, a.orig_id), (41, 41, 41));
}

#[test]
fn test_release_unknown_stage_fails() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    let err = sim
        .release(AgentState::new("Adult", 0).at(-168.0, 55.0, 10.0))
        .unwrap_err();
    assert!(matches!(err, DriftError::Config(_)));
    assert_eq!(sim.agent_count(), 0);
}

#[test]
fn test_failed_step_leaves_agent_and_batch_continues() {
    let mut larva = stage("Larva");
    larva.growth = FunctionSpec::new("consumption");
    let mut sim = simulation(flowing([0.1, 0.0, 0.0]), vec![larva, stage("Egg")]);

    let mut starving = AgentState::new("Larva", 0).at(-168.0, 55.0, 10.0);
    starving.weight = 0.0;
    let bad = sim.release(starving).unwrap();
    let good = sim
        .release(AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0))
        .unwrap();
    let before = sim.agents();
    let rows_before = sim.report_rows();

    let report = sim.update(3600.0);
    assert_eq!(report.stepped, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].agent_id, bad);

    let after = sim.agents();
    assert_eq!(after[0], before[0]);
    assert_eq!(sim.report_rows()[0], rows_before[0]);
    assert_eq!(after[1].id, good);
    assert_eq!(after[1].time, 3600.0);
}

#[test]
fn test_exit_reported_and_despawned() {
    let mut sim = simulation(flowing([-1.0, 0.0, 0.0]), vec![stage("Egg")]);
    let id = sim
        .release(AgentState::new("Egg", 0).at(-169.9, 55.0, 10.0))
        .unwrap();
    sim.release(AgentState::new("Egg", 0).at(-166.0, 55.0, 10.0))
        .unwrap();

    let report = sim.update(3600.0);
    assert_eq!(report.exited, vec![(id, "0_20".to_string())]);
    assert_eq!(report.terminated, 1);
    assert_eq!(sim.active_count(), 1);

    // dead agents are skipped on later updates
    let report = sim.update(3600.0);
    assert_eq!(report.stepped, 1);

    assert_eq!(sim.despawn_dead(), 1);
    assert_eq!(sim.agent_count(), 1);
}

#[test]
fn test_exit_on_field_without_data_past_edge() {
    let mut sim = simulation(Bounded(flowing([-3.0, 0.0, 0.0])), vec![stage("Egg")]);
    let id = sim
        .release(AgentState::new("Egg", 0).at(-169.9, 55.0, 10.0))
        .unwrap();

    let report = sim.update(3600.0);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.exited, vec![(id, "0_20".to_string())]);
    assert_eq!(sim.active_count(), 0);

    let report = sim.update(3600.0);
    assert_eq!(report.stepped, 0);
    assert!(report.failures.is_empty());
}

// ── Release checks ─────────────────────────────────────────────────────

fn rejected_field(err: DriftError) -> String {
    match err {
        DriftError::Config(ConfigError::InvalidValue { field, .. }) => field,
        DriftError::MalformedRecord { field, .. } => field,
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_release_rejects_id_of_living_agent() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    sim.release(AgentState::new("Egg", 5).at(-168.0, 55.0, 10.0))
        .unwrap();
    let err = sim
        .release(AgentState::new("Egg", 5).at(-167.0, 55.0, 10.0))
        .unwrap_err();
    assert_eq!(rejected_field(err), keys::ID);
    assert_eq!(sim.agent_count(), 1);
    assert_eq!(
        sim.release(AgentState::new("Egg", 0).at(-167.0, 55.0, 10.0))
            .unwrap(),
        6
    );
}

#[test]
fn test_release_rejects_negative_abundance_and_age() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    let mut a = AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0);
    a.number = -3.0;
    assert_eq!(rejected_field(sim.release(a).unwrap_err()), keys::NUMBER);

    let mut b = AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0);
    b.age_in_stage = -1.0;
    assert_eq!(rejected_field(sim.release(b).unwrap_err()), keys::AGE_IN_STAGE);

    let mut c = AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0);
    c.number = f64::NAN;
    assert_eq!(rejected_field(sim.release(c).unwrap_err()), keys::NUMBER);
    assert_eq!(sim.agent_count(), 0);
}

#[test]
fn test_release_rows_rejects_repeated_id() {
    let mut source = simulation(still_water(), vec![stage("Egg")]);
    spread(&mut source, "Egg", 2);
    let rows = source.report_rows();
    let text = format!("{}\n{}\n{}\n{}", source.report_header(), rows[0], rows[1], rows[0]);

    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    match sim.release_rows(&text) {
        Err(DriftError::MalformedRecord { field, value, row, .. }) => {
            assert_eq!(field, keys::ID);
            assert_eq!(value, "1");
            assert_eq!(row.len(), sim.schema().len());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(sim.agent_count(), 0);

    // ids already alive in the world are refused too
    let mut busy = simulation(still_water(), vec![stage("Egg")]);
    spread(&mut busy, "Egg", 1);
    let text = format!("{}\n{}", source.report_header(), rows[0]);
    assert_eq!(rejected_field(busy.release_rows(&text).unwrap_err()), keys::ID);
    assert_eq!(busy.agent_count(), 1);
}

#[test]
fn test_release_rows_rejects_negative_number() {
    let mut source = simulation(still_water(), vec![stage("Egg")]);
    spread(&mut source, "Egg", 2);
    let rows = source.report_rows();
    let number_at = source.schema().index_of(keys::NUMBER).unwrap();
    let mut fields: Vec<&str> = rows[1].split(',').collect();
    fields[number_at] = "-2";
    let broken = fields.join(",");

    let text = format!("{}\n{}\n{}", source.report_header(), rows[0], broken);
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    match sim.release_rows(&text) {
        Err(DriftError::MalformedRecord { field, value, row, .. }) => {
            assert_eq!(field, keys::NUMBER);
            assert_eq!(value, "-2");
            assert_eq!(row[number_at], "-2");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(sim.agent_count(), 0);
}

// ── Stage attributes ───────────────────────────────────────────────────

fn maternal_chain() -> SimulationEngine {
    let mut egg = stage("Egg");
    egg.next_stage = Some("Larva".into());
    egg.extra_attributes = vec!["maternalAge".into()];
    let mut larva = stage("Larva");
    larva.extra_attributes = vec!["maternalAge".into(), "oilGlobuleVolume".into()];
    larva.initial_condition = Some(FunctionSpec::new("maternalOgv"));
    simulation(still_water(), vec![egg, larva])
}

#[test]
fn test_larva_gets_oil_globule_volume_on_entry() {
    let mut sim = maternal_chain();
    assert!(sim
        .report_header()
        .ends_with("chla,maternalAge,oilGlobuleVolume"));
    let egg = AgentState::new("Egg", 0)
        .at(-168.0, 55.0, 10.0)
        .with_attribute("maternalAge", 20.0);
    let id = sim.release(egg).unwrap();
    let before = sim.agents();
    assert!(!before[0].stage_attributes.contains_key("oilGlobuleVolume"));

    sim.update(3600.0);
    let larva = sim
        .agents()
        .into_iter()
        .find(|a| a.type_name == "Larva")
        .unwrap();
    assert_eq!(larva.id, id);
    assert_eq!(larva.stage_attributes.get("maternalAge"), Some(&20.0));
    // week 1: 0.05 + 0.0007·20 − 0.002·1
    let ogv = larva.stage_attributes["oilGlobuleVolume"];
    assert!((ogv - 0.062).abs() < 1e-12, "ogv {}", ogv);
}

#[test]
fn test_released_larva_keeps_supplied_volume() {
    let mut sim = maternal_chain();
    let given = AgentState::new("Larva", 0)
        .at(-168.0, 55.0, 10.0)
        .with_attribute("oilGlobuleVolume", 0.3)
        .with_attribute("eggDiameter", 1.2);
    sim.release(given).unwrap();
    let fresh = AgentState::new("Larva", 0).at(-167.0, 55.0, 10.0);
    sim.release(fresh).unwrap();

    let agents = sim.agents();
    assert_eq!(agents[0].stage_attributes.get("oilGlobuleVolume"), Some(&0.3));
    // attributes the stage does not declare are dropped
    assert!(!agents[0].stage_attributes.contains_key("eggDiameter"));
    let ogv = agents[1].stage_attributes["oilGlobuleVolume"];
    assert!((ogv - 0.048).abs() < 1e-12, "ogv {}", ogv);
}

// ── Stage transitions ──────────────────────────────────────────────────

#[test]
fn test_split_conserves_abundance_without_mortality() {
    let mut larva = stage("Larva");
    larva.next_stage = Some("Juvenile".into());
    larva.super_individual = true;
    larva.stage_transition_rate = 0.5;
    let mut sim = simulation(still_water(), vec![larva, stage("Juvenile")]);
    let mut a = AgentState::new("Larva", 0).at(-168.0, 55.0, 10.0);
    a.number = 1000.0;
    let parent = sim.release(a).unwrap();

    for _ in 0..24 {
        sim.update(3600.0);
    }
    let total = sim.total_abundance();
    assert!((total - 1000.0).abs() < 1e-6, "total {}", total);
    assert_eq!(sim.count_in_stage("Larva"), 1);
    assert_eq!(sim.count_in_stage("Juvenile"), 24);
    for j in sim.agents().iter().filter(|a| a.type_name == "Juvenile") {
        assert_eq!(j.parent_id, parent);
        assert_eq!(j.orig_id, parent);
        assert_ne!(j.id, parent);
        assert!(j.start_time > 0.0);
    }
}

#[test]
fn test_whole_transition_keeps_id_in_world() {
    let mut egg = stage("Egg");
    egg.next_stage = Some("Larva".into());
    let mut sim = simulation(still_water(), vec![egg, stage("Larva")]);
    let id = sim
        .release(AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0))
        .unwrap();

    let report = sim.update(3600.0);
    assert_eq!(report.successors, 1);
    assert_eq!(sim.agent_count(), 2);
    let agents = sim.agents();
    let egg = agents.iter().find(|a| a.type_name == "Egg").unwrap();
    let larva = agents.iter().find(|a| a.type_name == "Larva").unwrap();
    assert_eq!(egg.id, id);
    assert!(!egg.alive);
    assert_eq!(larva.id, id);
    assert!(larva.alive);
    assert_eq!(larva.start_time, 3600.0);
}

// ── Parallel ───────────────────────────────────────────────────────────

fn walkers() -> SimulationEngine {
    let mut larva = stage("Larva");
    larva.horizontal_random_walk = 5.0;
    larva.swimming = Some(FunctionSpec::new("constant").with("rate", 0.01));
    let mut sim = simulation(flowing([0.05, 0.0, 0.0]), vec![larva]);
    spread(&mut sim, "Larva", 40);
    sim
}

#[test]
fn test_parallel_reproducible() {
    let mut a = walkers();
    let mut b = walkers();
    for _ in 0..3 {
        let ra = a.update_parallel(1800.0, 4);
        let rb = b.update_parallel(1800.0, 4);
        assert_eq!(ra.stepped, 40);
        assert_eq!(ra, rb);
    }
    assert_eq!(a.agents(), b.agents());
    assert_eq!(a.report_rows(), b.report_rows());
}

fn splitting(random_walk: f64) -> SimulationEngine {
    let mut larva = stage("Larva");
    larva.next_stage = Some("Juvenile".into());
    larva.super_individual = true;
    larva.stage_transition_rate = 0.5;
    larva.horizontal_random_walk = random_walk;
    let mut sim = simulation(flowing([0.02, 0.01, 0.0]), vec![larva, stage("Juvenile")]);
    spread(&mut sim, "Larva", 30);
    sim
}

#[test]
fn test_parallel_split_ids_reproducible() {
    let mut a = splitting(5.0);
    let mut b = splitting(5.0);
    for _ in 0..3 {
        let ra = a.update_parallel(1800.0, 4);
        let rb = b.update_parallel(1800.0, 4);
        assert_eq!(ra.successors, 30);
        assert_eq!(ra, rb);
    }
    assert_eq!(a.agents(), b.agents());
    assert_eq!(a.report_rows(), b.report_rows());

    let mut ids: Vec<u64> = a.agents().iter().map(|x| x.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 30 + 3 * 30);
}

#[test]
fn test_parallel_split_ids_match_sequential() {
    let mut seq = splitting(0.0);
    let mut par = splitting(0.0);
    for _ in 0..3 {
        seq.update(1800.0);
        par.update_parallel(1800.0, 3);
    }
    assert_eq!(seq.agents(), par.agents());
}

#[test]
fn test_parallel_matches_sequential_without_noise() {
    let mut egg = stage("Egg");
    egg.next_stage = Some("Larva".into());
    egg.min_stage_duration = 0.1;
    let stages = vec![egg, stage("Larva")];

    let mut seq = simulation(flowing([0.03, -0.01, 0.0]), stages.clone());
    let mut par = simulation(flowing([0.03, -0.01, 0.0]), stages);
    spread(&mut seq, "Egg", 25);
    spread(&mut par, "Egg", 25);

    for _ in 0..6 {
        let rs = seq.update(1800.0);
        let rp = par.update_parallel(1800.0, 3);
        assert_eq!(rs.stepped, rp.stepped);
        assert_eq!(rs.successors, rp.successors);
    }
    assert_eq!(par.count_in_stage("Larva"), 25);
    assert_eq!(seq.agents(), par.agents());
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn test_save_load_round_trip() {
    let mut sim = simulation(flowing([0.02, 0.02, 0.0]), vec![stage("Egg")]);
    spread(&mut sim, "Egg", 5);
    sim.run(4);

    let mut buf = Vec::new();
    sim.save(&mut buf).unwrap();

    let mut restored = simulation(still_water(), vec![stage("Egg")]);
    restored.load(buf.as_slice()).unwrap();
    assert_eq!(restored.step_count(), 4);
    assert_eq!(restored.sim_time(), sim.sim_time());
    assert_eq!(restored.agents(), sim.agents());
    assert_eq!(restored.report_rows(), sim.report_rows());

    let next = restored
        .release(AgentState::new("Egg", 0).at(-168.0, 55.0, 10.0))
        .unwrap();
    assert_eq!(next, 6);
}

#[test]
fn test_load_rejects_garbage() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    assert!(sim.load(&b"not a save file"[..]).is_err());
}

// ── Attribute rows ─────────────────────────────────────────────────────

#[test]
fn test_row_round_trip_of_stepped_agent() {
    let mut sim = simulation(flowing([0.1, 0.05, 0.0]), vec![stage("Egg")]);
    let mut a = AgentState::new("Egg", 0).at(-168.25, 54.75, 33.0);
    a.number = 0.0;
    sim.release(a).unwrap();
    sim.run(3);

    let agent = sim.agents().remove(0);
    assert!(agent.horiz_pos1 < 0.0);
    let row = AttributeRecord::from_agent(sim.schema().clone(), &agent).to_row();
    assert_eq!(row, sim.report_rows()[0]);
    let back = AttributeRecord::from_row(sim.schema().clone(), &row)
        .unwrap()
        .to_agent()
        .unwrap();
    assert_eq!(back, agent);
}

#[test]
fn test_release_rows_from_report() {
    let mut source = simulation(still_water(), vec![stage("Egg")]);
    spread(&mut source, "Egg", 4);
    let mut text = source.report_header();
    for row in source.report_rows() {
        text.push('\n');
        text.push_str(&row);
    }

    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    assert_eq!(sim.release_rows(&text).unwrap(), 4);
    let ids: Vec<u64> = sim.agents().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    for (a, b) in sim.agents().iter().zip(source.agents()) {
        assert!((a.horiz_pos1 - b.horiz_pos1).abs() < 1e-9);
        assert!((a.vert_pos - b.vert_pos).abs() < 1e-9);
    }
}

#[test]
fn test_malformed_row_releases_nothing() {
    let mut source = simulation(still_water(), vec![stage("Egg")]);
    spread(&mut source, "Egg", 3);
    let rows = source.report_rows();
    let size_at = source.schema().index_of(keys::SIZE).unwrap();
    let mut fields: Vec<&str> = rows[2].split(',').collect();
    fields[size_at] = "abc";
    let broken = fields.join(",");

    let text = format!("{}\n{}\n{}\n{}", source.report_header(), rows[0], rows[1], broken);
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    match sim.release_rows(&text) {
        Err(DriftError::MalformedRecord { field, value, row, .. }) => {
            assert_eq!(field, keys::SIZE);
            assert_eq!(value, "abc");
            assert_eq!(row.len(), sim.schema().len());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(sim.agent_count(), 0);
}

#[test]
fn test_release_rows_rejects_wrong_header() {
    let mut sim = simulation(still_water(), vec![stage("Egg")]);
    assert!(sim.release_rows("typeName,id\nEgg,1").is_err());
    assert_eq!(sim.agent_count(), 0);
}
