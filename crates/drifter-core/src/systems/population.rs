//! Population systems: step every active agent in the world, then apply
//! the results and spawn successors.

use std::sync::{mpsc, Arc};
use std::thread;

use drifter_logic::random::{RandomSource, SeededNormal};
use hecs::{Entity, World};

use super::{StepEngine, StepResult};
use crate::components::{AgentState, AttributeRecord, AttributeSchema};
use crate::error::StepError;

/// Tally of one population update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub stepped: usize,
    pub successors: usize,
    pub terminated: usize,
    /// (agent id, exit cell) for agents that left the grid.
    pub exited: Vec<(u64, String)>,
    /// Rejected steps; those agents are unchanged.
    pub failures: Vec<StepError>,
}

impl UpdateReport {
    /// Fold another update's tally into this one.
    pub fn absorb(&mut self, other: UpdateReport) {
        self.stepped += other.stepped;
        self.successors += other.successors;
        self.terminated += other.terminated;
        self.exited.extend(other.exited);
        self.failures.extend(other.failures);
    }

    fn record(&mut self, result: &StepResult) {
        self.stepped += 1;
        self.successors += result.successors.len();
        if result.terminated {
            self.terminated += 1;
        }
        if let Some(cell) = &result.exit_cell {
            self.exited.push((result.agent.id, cell.clone()));
        }
    }

    fn fail(&mut self, err: StepError) {
        log::warn!("{}", err);
        self.failures.push(err);
    }
}

/// Step every active agent in turn with one random stream.
pub fn step_system(
    world: &mut World,
    engine: &StepEngine,
    schema: &Arc<AttributeSchema>,
    dt: f64,
    random: &mut dyn RandomSource,
) -> UpdateReport {
    let mut report = UpdateReport::default();
    let mut spawned = Vec::new();

    for (_entity, (agent, record)) in world.query_mut::<(&mut AgentState, &mut AttributeRecord)>() {
        if !agent.active {
            continue;
        }
        match engine.step(agent, dt, random) {
            Ok(mut result) => {
                report.record(&result);
                spawned.append(&mut result.successors);
                record.commit(&result.agent);
                *agent = result.agent;
            }
            Err(err) => report.fail(err),
        }
    }

    spawn_agents(world, schema, spawned);
    report
}

/// Step active agents on `workers` scoped threads. Worker `w` draws from
/// its own stream derived from (`seed`, `step_index`, `w`); successors are
/// funnelled through one channel and spawned once all workers finish.
///
/// Workers leave split successors unnumbered. Ids are handed out after the
/// join, ordered by the predecessor's place in the query, so a given seed
/// and worker count always yields the same ids.
pub fn parallel_step_system(
    world: &mut World,
    engine: &StepEngine,
    schema: &Arc<AttributeSchema>,
    dt: f64,
    workers: usize,
    seed: u64,
    step_index: u64,
) -> UpdateReport {
    let workers = workers.max(1);
    let (tx, rx) = mpsc::channel::<(usize, usize, AgentState)>();

    let outcomes: Vec<(Entity, Result<StepResult, StepError>)> = {
        let mut query = world.query::<&AgentState>();
        let jobs: Vec<(usize, Entity, &AgentState)> = query
            .iter()
            .filter(|(_, a)| a.active)
            .enumerate()
            .map(|(order, (entity, agent))| (order, entity, agent))
            .collect();
        let chunk = ((jobs.len() + workers - 1) / workers).max(1);

        thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk)
                .enumerate()
                .map(|(w, part)| {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let mut random = SeededNormal::stream(seed, step_index, w as u64);
                        part.iter()
                            .map(|(order, entity, agent)| {
                                let outcome = engine.step_pending(agent, dt, &mut random).map(|mut r| {
                                    for (n, s) in r.successors.drain(..).enumerate() {
                                        // receiver outlives every worker
                                        let _ = tx.send((*order, n, s));
                                    }
                                    r
                                });
                                (*entity, outcome)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(part) => part,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    };
    drop(tx);

    let mut report = UpdateReport::default();
    for (entity, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                report.record(&result);
                if let Ok((agent, record)) =
                    world.query_one_mut::<(&mut AgentState, &mut AttributeRecord)>(entity)
                {
                    record.commit(&result.agent);
                    *agent = result.agent;
                }
            }
            Err(err) => report.fail(err),
        }
    }

    let mut arrivals: Vec<(usize, usize, AgentState)> = rx.into_iter().collect();
    arrivals.sort_by_key(|(order, n, _)| (*order, *n));
    let mut spawned: Vec<AgentState> = arrivals.into_iter().map(|(_, _, s)| s).collect();
    engine.assign_successor_ids(&mut spawned);
    report.successors = spawned.len();
    spawn_agents(world, schema, spawned);
    report
}

/// Spawn agents with freshly committed attribute records.
pub fn spawn_agents(world: &mut World, schema: &Arc<AttributeSchema>, agents: Vec<AgentState>) {
    for agent in agents {
        let record = AttributeRecord::from_agent(schema.clone(), &agent);
        world.spawn((agent, record));
    }
}
