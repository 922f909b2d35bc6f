//! Step engine: one timestep for one agent.
//!
//! Order within a step:
//! 1. swim velocity from the swimming function and random walk
//! 2. predictor-corrector advection through current + swim
//! 3. clock: `time`, `age`, `ageInStage`
//! 4. abundance decay (mortality, then transition into `numTrans`)
//! 5. growth
//! 6. grid-edge exit, which ends the step without resampling
//! 7. resample the environment at the new position
//! 8. maximum-duration timeout, then stage transition
//!
//! Everything happens on a working copy; a failure anywhere returns a
//! [`StepError`] and the caller's agent is untouched.
//!
//! Split successors leave the engine with [`PENDING_ID`]; the caller hands
//! out real ids with [`StepEngine::assign_successor_ids`] in an order it
//! controls.

use std::sync::Arc;

use drifter_logic::constants::{horiz_types, vert_types, DAY_SECS};
use drifter_logic::error::{finite, ConfigError, NumericResult};
use drifter_logic::functions::{Body, InitialConditionFunction};
use drifter_logic::random::RandomSource;
use drifter_logic::solar;
use drifter_logic::tracker::{GridPosition, IndexVelocity, ParticleTracker};
use drifter_logic::transition::{
    is_timed_out, is_transition_eligible, transition_kind, LifecycleState, TransitionKind,
};

use crate::components::{AgentState, IdAllocator, TrackPoint};
use crate::config::SimulationConfig;
use crate::environment::{EnvironmentField, EnvironmentSample};
use crate::error::{StepError, StepFailure};
use crate::stages::{Stage, StageRegistry};

/// Id carried by split successors until the caller assigns one. Never the
/// id of a living agent.
pub const PENDING_ID: u64 = 0;

/// Outcome of a successful step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub agent: AgentState,
    /// Agents created by a stage transition this step.
    pub successors: Vec<AgentState>,
    /// The agent died this step (or was already dead).
    pub terminated: bool,
    /// Grid cell through which the agent left the domain.
    pub exit_cell: Option<String>,
    pub transition: TransitionKind,
}

impl StepResult {
    fn unchanged(agent: &AgentState) -> Self {
        Self {
            agent: agent.clone(),
            successors: Vec::new(),
            terminated: !agent.alive,
            exit_cell: None,
            transition: TransitionKind::Stay,
        }
    }
}

/// Steps agents against a shared environment and stage registry. `Sync`,
/// so parallel workers can share one engine by reference.
pub struct StepEngine {
    environment: Arc<dyn EnvironmentField>,
    stages: StageRegistry,
    ids: IdAllocator,
    edge_tolerance: f64,
    reference_year: i32,
    covariates: Vec<String>,
}

impl StepEngine {
    pub fn new(
        environment: Arc<dyn EnvironmentField>,
        stages: StageRegistry,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            environment,
            stages,
            ids: IdAllocator::default(),
            edge_tolerance: config.grid_edge_tolerance,
            reference_year: config.reference_year,
            covariates: config.covariates.clone(),
        }
    }

    pub fn environment(&self) -> &dyn EnvironmentField {
        self.environment.as_ref()
    }

    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// First placement of a released agent: resolve its position types to
    /// a grid position, reset the track, and report the position as
    /// geographic + depth below surface with fresh environment values.
    pub fn initialize_position(&self, agent: &AgentState) -> Result<AgentState, StepError> {
        self.place(agent)
            .map_err(|f| StepError::new(agent.id, agent.start_time, 0.0, f))
    }

    /// Advance `agent` by `dt` seconds (negative runs backward). Split
    /// successors get fresh ids straight away.
    pub fn step(
        &self,
        agent: &AgentState,
        dt: f64,
        random: &mut dyn RandomSource,
    ) -> Result<StepResult, StepError> {
        let mut result = self.step_pending(agent, dt, random)?;
        self.assign_successor_ids(&mut result.successors);
        Ok(result)
    }

    /// Like [`step`](Self::step), but split successors keep [`PENDING_ID`].
    pub fn step_pending(
        &self,
        agent: &AgentState,
        dt: f64,
        random: &mut dyn RandomSource,
    ) -> Result<StepResult, StepError> {
        self.advance(agent, dt, random)
            .map_err(|f| StepError::new(agent.id, agent.time, dt, f))
    }

    /// Give every successor still carrying [`PENDING_ID`] a fresh id, in
    /// slice order.
    pub fn assign_successor_ids(&self, successors: &mut [AgentState]) {
        for s in successors.iter_mut().filter(|s| s.id == PENDING_ID) {
            s.id = self.ids.next_id();
        }
    }

    /// Bring an agent's stage attributes in line with its stage: drop the
    /// ones the stage does not carry and fill an unset initial condition.
    pub fn enter_stage(
        &self,
        agent: &mut AgentState,
        random: &mut dyn RandomSource,
    ) -> Result<(), StepError> {
        let stage = self
            .stages
            .require(&agent.type_name)
            .map_err(|e| StepError::new(agent.id, agent.time, 0.0, e))?;
        self.apply_stage_attributes(stage, agent, random)
            .map_err(|e| StepError::new(agent.id, agent.time, 0.0, e))
    }

    fn apply_stage_attributes(
        &self,
        stage: &Stage,
        a: &mut AgentState,
        random: &mut dyn RandomSource,
    ) -> NumericResult<()> {
        a.stage_attributes
            .retain(|name, _| stage.extra_attributes.contains(name));
        if let Some(f) = &stage.initial_condition {
            if !a.stage_attributes.contains_key(f.target()) {
                let maternal_age = a
                    .stage_attributes
                    .get(InitialConditionFunction::MATERNAL_AGE)
                    .copied()
                    .unwrap_or(0.0);
                let week = solar::week_of_year(a.time, self.reference_year);
                let value = f.initial_value(maternal_age, week, random)?;
                a.stage_attributes.insert(f.target().to_string(), value);
            }
        }
        Ok(())
    }

    fn place(&self, agent: &AgentState) -> Result<AgentState, StepFailure> {
        let stage = self.stages.require(&agent.type_name)?;
        let env = self.environment();
        let at = [agent.horiz_pos1, agent.horiz_pos2, agent.vert_pos];

        let ij = match agent.horiz_type {
            horiz_types::PROJECTED => env.projected_to_grid(agent.horiz_pos1, agent.horiz_pos2),
            horiz_types::GEOGRAPHIC => env.geo_to_grid(agent.horiz_pos1, agent.horiz_pos2),
            other => {
                return Err(ConfigError::invalid("horizType", other, "unknown horizontal position type").into())
            }
        };
        let ij = [
            finite(ij[0], "horizontal position to grid", &at)?,
            finite(ij[1], "horizontal position to grid", &at)?,
        ];
        let bottom = finite(env.bathymetric_depth(ij), "bathymetry", &at)?;
        let ssh = finite(env.sea_surface_height(ij), "sea surface height", &at)?;
        let column = bottom + ssh;
        let n = env.levels();
        let v = agent.vert_pos;

        let attached = agent.attached || stage.attached;
        let k = if attached {
            0.0
        } else {
            match agent.vert_type {
                vert_types::GRID_LEVEL => v,
                vert_types::ELEVATION if v < -bottom => 0.0,
                vert_types::ELEVATION if v > ssh => n,
                vert_types::ELEVATION => env.vertical_index_from_depth(ij, ssh - v),
                vert_types::DEPTH_BELOW_SURFACE if v > column => 0.0,
                vert_types::DEPTH_BELOW_SURFACE if v < 0.0 => n,
                vert_types::DEPTH_BELOW_SURFACE => env.vertical_index_from_depth(ij, v),
                vert_types::HEIGHT_ABOVE_BOTTOM if v < 0.0 => 0.0,
                vert_types::HEIGHT_ABOVE_BOTTOM if v > column => n,
                vert_types::HEIGHT_ABOVE_BOTTOM => env.vertical_index_from_depth(ij, column - v),
                other => {
                    return Err(ConfigError::invalid("vertType", other, "unknown vertical position type").into())
                }
            }
        };
        let k = finite(k, "vertical index", &at)?.clamp(0.0, n);

        let mut a = agent.clone();
        a.attached = attached;
        a.time = a.start_time;
        a.num_trans = 0.0;
        a.lifecycle = LifecycleState::Active;
        a.track.clear();
        self.refresh(&mut a, GridPosition::new(ij[0], ij[1], k))?;
        Ok(a)
    }

    /// Sample the environment at `pos` and write position, environment and
    /// track onto the agent.
    fn refresh(&self, a: &mut AgentState, pos: GridPosition) -> NumericResult<()> {
        let env = self.environment();
        let s = EnvironmentSample::take(env, &pos, &self.covariates)?;
        a.horiz_type = horiz_types::GEOGRAPHIC;
        a.vert_type = vert_types::DEPTH_BELOW_SURFACE;
        a.horiz_pos1 = s.lon;
        a.horiz_pos2 = s.lat;
        a.vert_pos = s.depth;
        a.temperature = s.temperature;
        a.salinity = s.salinity;
        a.bathymetry = s.bathymetry;
        a.covariates.extend(s.covariates);
        a.grid_position = Some(pos);
        a.grid_cell_id = env.grid_cell_id(&pos, self.edge_tolerance);
        a.track.push(TrackPoint::new(s.lon, s.lat, s.depth));
        Ok(())
    }

    fn advance(
        &self,
        agent: &AgentState,
        dt: f64,
        random: &mut dyn RandomSource,
    ) -> Result<StepResult, StepFailure> {
        if !agent.active {
            return Ok(StepResult::unchanged(agent));
        }
        let stage = self.stages.require(&agent.type_name)?;
        let env = self.environment();

        let mut a = if agent.grid_position.is_some() {
            agent.clone()
        } else {
            self.place(agent)?
        };
        let start = a.grid_position.unwrap_or_default();

        // movement
        let mut tracker = ParticleTracker::new(start, env.levels());
        let end = if a.attached || stage.attached {
            tracker.attach_to_bottom()
        } else {
            let swim = swim_velocity(stage, a.size, dt, random)?;
            // a prediction past the edge reuses the velocity at the start
            let mut at_start: Option<IndexVelocity> = None;
            tracker.advance(dt, |p| {
                if let Some(v) = at_start.filter(|_| env.is_near_domain_edge(p, self.edge_tolerance)) {
                    return Ok(v);
                }
                let c = env.current_velocity(p);
                let v = IndexVelocity::from_metres(
                    [c[0] + swim[0], c[1] + swim[1], c[2]],
                    env.grid_spacing(p),
                );
                at_start.get_or_insert(v);
                Ok(v)
            })?
        };

        // clock
        let dt_days = dt / DAY_SECS;
        a.time += dt;
        a.age += dt_days;
        a.age_in_stage += dt_days;

        // abundance, driven by the temperature of the last committed sample
        let abundance = stage.mortality.decay(
            a.abundance(),
            a.temperature,
            a.age_in_stage,
            &stage.limits,
            dt,
            random,
        )?;
        a.set_abundance(abundance);

        // growth
        let day = solar::day_of_year(a.time, self.reference_year);
        let daylight = solar::is_daytime(a.horiz_pos1, a.horiz_pos2, day);
        let body = stage.growth.grow(
            Body {
                size: a.size,
                weight: a.weight,
            },
            a.temperature,
            daylight,
            dt_days,
            &stage.length_at_weight,
            random,
        )?;
        a.size = body.size;
        a.weight = body.weight;

        // fields need not be defined past the edge, so exit before sampling
        if env.is_near_domain_edge(&end, self.edge_tolerance) {
            self.exit(&mut a, end);
            log::info!(
                "agent {} exited grid at [{:.3}, {:.3}]: {}",
                a.id,
                end.i,
                end.j,
                a.grid_cell_id
            );
            let exit_cell = Some(a.grid_cell_id.clone());
            return Ok(StepResult {
                agent: a,
                successors: Vec::new(),
                terminated: true,
                exit_cell,
                transition: TransitionKind::Stay,
            });
        }

        self.refresh(&mut a, end)?;

        let mut result = StepResult {
            agent: a,
            successors: Vec::new(),
            terminated: false,
            exit_cell: None,
            transition: TransitionKind::Stay,
        };
        let a = &mut result.agent;

        if is_timed_out(a.age_in_stage, &stage.limits) {
            a.terminate();
            log::debug!("agent {} timed out in stage {}", a.id, a.type_name);
        } else {
            let eligible = is_transition_eligible(a.age_in_stage, a.size, dt, &stage.limits);
            let kind = transition_kind(
                eligible,
                stage.next_stage.is_some(),
                stage.super_individual,
                a.num_trans,
            );
            if let (Some(next), TransitionKind::Split | TransitionKind::Whole) =
                (stage.next_stage.as_deref(), kind)
            {
                let successor = if kind == TransitionKind::Split {
                    let child = self.successor(a, next, PENDING_ID, a.id, a.num_trans, random)?;
                    a.num_trans = 0.0;
                    child
                } else {
                    a.lifecycle = LifecycleState::Transitioned;
                    let child = self.successor(a, next, a.id, a.parent_id, a.number, random)?;
                    a.terminate();
                    child
                };
                log::debug!(
                    "agent {} ({}) -> {} ({:?}), number {}",
                    a.id,
                    a.type_name,
                    successor.type_name,
                    kind,
                    successor.number
                );
                result.successors.push(successor);
                result.transition = kind;
            }
        }
        result.terminated = !result.agent.alive;
        Ok(result)
    }

    /// Commit a grid exit at `end` from values that need no field sample.
    fn exit(&self, a: &mut AgentState, end: GridPosition) {
        let env = self.environment();
        let [lon, lat] = env.grid_to_geo(end.horizontal());
        if lon.is_finite() && lat.is_finite() {
            a.horiz_type = horiz_types::GEOGRAPHIC;
            a.horiz_pos1 = lon;
            a.horiz_pos2 = lat;
            a.track.push(TrackPoint::new(lon, lat, a.vert_pos));
        }
        a.grid_position = Some(end);
        a.grid_cell_id = env.grid_cell_id(&end, self.edge_tolerance);
        a.terminate();
    }

    fn successor(
        &self,
        predecessor: &AgentState,
        next: &str,
        id: u64,
        parent_id: u64,
        number: f64,
        random: &mut dyn RandomSource,
    ) -> Result<AgentState, StepFailure> {
        let stage = self.stages.require(next)?;
        let mut s = predecessor.clone();
        s.type_name = next.to_string();
        s.id = id;
        s.parent_id = parent_id;
        s.orig_id = predecessor.orig_id;
        s.start_time = predecessor.time;
        s.age_in_stage = 0.0;
        s.number = number;
        s.num_trans = 0.0;
        s.active = true;
        s.alive = true;
        s.attached = stage.attached;
        s.lifecycle = LifecycleState::Active;
        s.track = predecessor.last_track_point().into_iter().collect();
        self.apply_stage_attributes(stage, &mut s, random)?;
        Ok(s)
    }
}

/// Horizontal swim velocity (m/s): random direction per component with
/// amplitude `speed + sqrt(rwp/|dt|)`, signed by the direction of time.
fn swim_velocity(
    stage: &Stage,
    size: f64,
    dt: f64,
    random: &mut dyn RandomSource,
) -> NumericResult<[f64; 2]> {
    let speed = match &stage.swimming {
        Some(f) => f.speed(dt, size, random)?,
        None => 0.0,
    };
    let walk = if stage.horizontal_random_walk > 0.0 && dt != 0.0 {
        (stage.horizontal_random_walk / dt.abs()).sqrt()
    } else {
        0.0
    };
    let amplitude = speed + walk;
    if amplitude == 0.0 {
        return Ok([0.0, 0.0]);
    }
    let sign = dt.signum();
    Ok([
        sign * amplitude * random.normal_variate(),
        sign * amplitude * random.normal_variate(),
    ])
}
