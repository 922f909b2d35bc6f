//! Simulation engine - main entry point for running a population

use std::io::{Read, Write};
use std::sync::Arc;

use drifter_logic::error::ConfigError;
use drifter_logic::random::SeededNormal;
use hecs::World;

use crate::components::{keys, AgentState, AttributeRecord, AttributeSchema, FIELD_DELIMITER};
use crate::config::SimulationConfig;
use crate::environment::EnvironmentField;
use crate::error::{DriftError, Result};
use crate::stages::StageRegistry;
use crate::systems::{parallel_step_system, spawn_agents, step_system, StepEngine, UpdateReport};

/// Owns every agent of every stage and steps them together.
pub struct SimulationEngine {
    /// ECS world; each agent entity has an `AgentState` and an `AttributeRecord`
    pub world: World,
    step_engine: StepEngine,
    schema: Arc<AttributeSchema>,
    config: SimulationConfig,
    random: SeededNormal,
    /// Simulation time in seconds since the reference epoch
    sim_time: f64,
    step_count: u64,
}

impl SimulationEngine {
    /// Build the stage registry and attribute schema. Any configuration
    /// problem stops the engine from being created.
    pub fn new(config: SimulationConfig, environment: Arc<dyn EnvironmentField>) -> Result<Self> {
        let stages = StageRegistry::from_config(&config.stages)?;
        let schema =
            AttributeSchema::with_stage_attributes(&config.covariates, &stages.extra_attributes())?;
        let step_engine = StepEngine::new(environment, stages, &config);
        log::info!(
            "engine ready: {} stages, {} attributes",
            step_engine.stages().len(),
            schema.len()
        );
        Ok(Self {
            world: World::new(),
            step_engine,
            schema,
            random: SeededNormal::new(config.seed),
            config,
            sim_time: 0.0,
            step_count: 0,
        })
    }

    pub fn from_json_str(json: &str, environment: Arc<dyn EnvironmentField>) -> Result<Self> {
        Self::new(SimulationConfig::from_json_str(json)?, environment)
    }

    /// Place a new agent and add it to the world. An id of 0 asks for a
    /// fresh one (which also becomes the lineage ids); other ids are kept
    /// but must not belong to a living agent.
    pub fn release(&mut self, agent: AgentState) -> Result<u64> {
        if let Some((field, value, reason)) = self.release_violation(&agent, &[]) {
            return Err(ConfigError::invalid(field, value, reason).into());
        }
        let placed = self.prepare_release(agent)?;
        let id = placed.id;
        log::debug!("released agent {} ({})", id, placed.type_name);
        spawn_agents(&mut self.world, &self.schema, vec![placed]);
        Ok(id)
    }

    /// Why `agent` cannot join the world alongside `batch`, as
    /// (field, value, reason).
    fn release_violation(
        &self,
        agent: &AgentState,
        batch: &[AgentState],
    ) -> Option<(&'static str, String, &'static str)> {
        if !agent.number.is_finite() || agent.number < 0.0 {
            return Some((keys::NUMBER, agent.number.to_string(), "must be a non-negative number"));
        }
        if !agent.num_trans.is_finite() || agent.num_trans < 0.0 {
            return Some((keys::NUM_TRANS, agent.num_trans.to_string(), "must be a non-negative number"));
        }
        if !agent.age_in_stage.is_finite() || agent.age_in_stage < 0.0 {
            return Some((keys::AGE_IN_STAGE, agent.age_in_stage.to_string(), "must be a non-negative number"));
        }
        if agent.id != 0 && agent.alive {
            let in_world = self
                .world
                .query::<&AgentState>()
                .iter()
                .any(|(_, a)| a.alive && a.id == agent.id);
            if in_world || batch.iter().any(|a| a.alive && a.id == agent.id) {
                return Some((keys::ID, agent.id.to_string(), "already used by a living agent"));
            }
        }
        None
    }

    fn prepare_release(&self, mut agent: AgentState) -> Result<AgentState> {
        self.step_engine.stages().require(&agent.type_name)?;
        let ids = self.step_engine.ids();
        if agent.id == 0 {
            agent.id = ids.next_id();
            agent.parent_id = agent.id;
            agent.orig_id = agent.id;
        } else {
            ids.observe(agent.id);
        }
        let mut placed = self.step_engine.initialize_position(&agent)?;
        // one stream per agent, so release order does not matter
        let mut random = SeededNormal::stream(self.config.seed, u64::MAX, placed.id);
        self.step_engine.enter_stage(&mut placed, &mut random)?;
        Ok(placed)
    }

    /// Release agents from delimited text: a header row matching the
    /// attribute schema, then one row per agent. Nothing is released unless
    /// every row parses and places.
    pub fn release_rows(&mut self, text: &str) -> Result<usize> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or_else(|| {
            DriftError::malformed("header", "", "no header row", &[])
        })?;
        self.schema.check_header(header)?;

        let mut agents: Vec<AgentState> = Vec::new();
        for line in lines {
            let agent = AttributeRecord::from_row(self.schema.clone(), line)?.to_agent()?;
            if let Some((field, value, reason)) = self.release_violation(&agent, &agents) {
                let row: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(FIELD_DELIMITER).collect();
                return Err(DriftError::malformed(field, value, reason, &row));
            }
            agents.push(self.prepare_release(agent)?);
        }
        let count = agents.len();
        spawn_agents(&mut self.world, &self.schema, agents);
        log::info!("released {} agents from rows", count);
        Ok(count)
    }

    /// Step every active agent by `dt` seconds.
    pub fn update(&mut self, dt: f64) -> UpdateReport {
        let report = step_system(
            &mut self.world,
            &self.step_engine,
            &self.schema,
            dt,
            &mut self.random,
        );
        self.finish_update(dt, &report);
        report
    }

    /// Like [`update`](Self::update) but spread over `workers` threads.
    /// Results are reproducible for a given seed and worker count.
    pub fn update_parallel(&mut self, dt: f64, workers: usize) -> UpdateReport {
        let report = parallel_step_system(
            &mut self.world,
            &self.step_engine,
            &self.schema,
            dt,
            workers,
            self.config.seed,
            self.step_count,
        );
        self.finish_update(dt, &report);
        report
    }

    fn finish_update(&mut self, dt: f64, report: &UpdateReport) {
        self.sim_time += dt;
        self.step_count += 1;
        log::debug!(
            "t={}s: stepped {}, successors {}, terminated {}, failed {}",
            self.sim_time,
            report.stepped,
            report.successors,
            report.terminated,
            report.failures.len()
        );
    }

    /// Run `steps` updates with the configured time step.
    pub fn run(&mut self, steps: usize) -> UpdateReport {
        let dt = self.config.time_step_secs;
        let mut total = UpdateReport::default();
        for _ in 0..steps {
            total.absorb(self.update(dt));
        }
        total
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn schema(&self) -> &Arc<AttributeSchema> {
        &self.schema
    }

    pub fn step_engine(&self) -> &StepEngine {
        &self.step_engine
    }

    /// Count all agent entities, dead or alive
    pub fn agent_count(&self) -> usize {
        self.world.query::<&AgentState>().iter().count()
    }

    pub fn active_count(&self) -> usize {
        self.world
            .query::<&AgentState>()
            .iter()
            .filter(|(_, a)| a.active)
            .count()
    }

    /// Active agents of one stage
    pub fn count_in_stage(&self, type_name: &str) -> usize {
        self.world
            .query::<&AgentState>()
            .iter()
            .filter(|(_, a)| a.active && a.type_name == type_name)
            .count()
    }

    /// Individuals represented by living agents, counting those still
    /// pending transition
    pub fn total_abundance(&self) -> f64 {
        self.world
            .query::<&AgentState>()
            .iter()
            .filter(|(_, a)| a.alive)
            .map(|(_, a)| a.number + a.num_trans)
            .sum()
    }

    /// Snapshot of all agents, in id order
    pub fn agents(&self) -> Vec<AgentState> {
        let mut agents: Vec<AgentState> = self
            .world
            .query::<&AgentState>()
            .iter()
            .map(|(_, a)| a.clone())
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id).then(a.start_time.total_cmp(&b.start_time)));
        agents
    }

    pub fn report_header(&self) -> String {
        self.schema.header()
    }

    /// Committed attribute rows, in id order
    pub fn report_rows(&self) -> Vec<String> {
        let mut rows: Vec<(u64, f64, String)> = self
            .world
            .query::<(&AgentState, &AttributeRecord)>()
            .iter()
            .map(|(_, (a, r))| (a.id, a.start_time, r.to_row()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        rows.into_iter().map(|(_, _, row)| row).collect()
    }

    /// Remove dead agents from the world. Returns how many were removed.
    pub fn despawn_dead(&mut self) -> usize {
        let dead: Vec<hecs::Entity> = self
            .world
            .query::<&AgentState>()
            .iter()
            .filter(|(_, a)| !a.alive)
            .map(|(e, _)| e)
            .collect();
        for entity in &dead {
            let _ = self.world.despawn(*entity);
        }
        dead.len()
    }

    /// Save simulation state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        crate::persistence::save_simulation(
            writer,
            &self.world,
            self.sim_time,
            self.step_count,
            self.step_engine.ids().peek(),
        )
    }

    /// Load simulation state from a reader, replacing every agent. The
    /// sequential random stream restarts from the seed and step count.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let loaded = crate::persistence::load_simulation(reader)?;

        self.world = World::new();
        self.sim_time = loaded.sim_time;
        self.step_count = loaded.step_count;
        self.step_engine.ids().observe(loaded.next_id.saturating_sub(1));
        self.random = SeededNormal::stream(self.config.seed, self.step_count, 0);
        spawn_agents(&mut self.world, &self.schema, loaded.agents);
        Ok(())
    }
}
