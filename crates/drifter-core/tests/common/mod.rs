//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use drifter_core::prelude::*;
use drifter_logic::functions::FunctionSpec;
use drifter_logic::tracker::GridPosition;

/// 50 x 50 cells from (-170, 54) at 0.1° x 0.05°, 100 m deep, 20 levels.
pub fn still_water() -> RectilinearField {
    let mut field = RectilinearField::default();
    field.covariates.insert("chla".into(), 0.8);
    field
}

pub fn flowing(current: [f64; 3]) -> RectilinearField {
    RectilinearField {
        current,
        ..still_water()
    }
}

/// A field with no data outside its grid, like a real circulation model:
/// every sample past `0..n-1` is NaN.
pub struct Bounded(pub RectilinearField);

impl Bounded {
    fn inside(&self, ij: [f64; 2]) -> bool {
        let f = &self.0;
        (0.0..=(f.nx - 1) as f64).contains(&ij[0]) && (0.0..=(f.ny - 1) as f64).contains(&ij[1])
    }
}

impl EnvironmentField for Bounded {
    fn levels(&self) -> f64 {
        self.0.levels()
    }

    fn interpolate(&self, field: &str, pos: &GridPosition) -> f64 {
        if self.inside(pos.horizontal()) {
            self.0.interpolate(field, pos)
        } else {
            f64::NAN
        }
    }

    fn geo_to_grid(&self, lon: f64, lat: f64) -> [f64; 2] {
        self.0.geo_to_grid(lon, lat)
    }

    fn projected_to_grid(&self, x: f64, y: f64) -> [f64; 2] {
        self.0.projected_to_grid(x, y)
    }

    fn grid_to_geo(&self, ij: [f64; 2]) -> [f64; 2] {
        self.0.grid_to_geo(ij)
    }

    fn bathymetric_depth(&self, ij: [f64; 2]) -> f64 {
        if self.inside(ij) {
            self.0.bathymetric_depth(ij)
        } else {
            f64::NAN
        }
    }

    fn sea_surface_height(&self, ij: [f64; 2]) -> f64 {
        if self.inside(ij) {
            self.0.sea_surface_height(ij)
        } else {
            f64::NAN
        }
    }

    fn vertical_index_from_depth(&self, ij: [f64; 2], depth: f64) -> f64 {
        if self.inside(ij) {
            self.0.vertical_index_from_depth(ij, depth)
        } else {
            f64::NAN
        }
    }

    fn depth_at_grid_position(&self, pos: &GridPosition) -> f64 {
        if self.inside(pos.horizontal()) {
            self.0.depth_at_grid_position(pos)
        } else {
            f64::NAN
        }
    }

    fn current_velocity(&self, pos: &GridPosition) -> [f64; 3] {
        if self.inside(pos.horizontal()) {
            self.0.current_velocity(pos)
        } else {
            [f64::NAN; 3]
        }
    }

    fn grid_spacing(&self, pos: &GridPosition) -> [f64; 3] {
        self.0.grid_spacing(pos)
    }

    fn is_near_domain_edge(&self, pos: &GridPosition, tolerance: f64) -> bool {
        self.0.is_near_domain_edge(pos, tolerance)
    }

    fn grid_cell_id(&self, pos: &GridPosition, tolerance: f64) -> String {
        self.0.grid_cell_id(pos, tolerance)
    }
}

pub fn stage(name: &str) -> StageConfig {
    StageConfig {
        name: name.into(),
        next_stage: None,
        super_individual: false,
        attached: false,
        min_stage_duration: 0.0,
        max_stage_duration: 1000.0,
        min_size: 0.0,
        stage_transition_rate: 0.0,
        horizontal_random_walk: 0.0,
        growth: FunctionSpec::new("constant").with("rate", 0.0),
        mortality: FunctionSpec::new("constant").with("rate", 0.0),
        swimming: None,
        length_at_weight: None,
        extra_attributes: Vec::new(),
        initial_condition: None,
    }
}

pub fn config(stages: Vec<StageConfig>) -> SimulationConfig {
    SimulationConfig {
        time_step_secs: 3600.0,
        seed: 42,
        reference_year: 2001,
        grid_edge_tolerance: 0.5,
        covariates: vec!["chla".into()],
        stages,
    }
}

pub fn step_engine(field: impl EnvironmentField + 'static, stages: Vec<StageConfig>) -> StepEngine {
    let cfg = config(stages);
    let registry = drifter_core::stages::StageRegistry::from_config(&cfg.stages).unwrap();
    StepEngine::new(Arc::new(field), registry, &cfg)
}

pub fn simulation(field: impl EnvironmentField + 'static, stages: Vec<StageConfig>) -> SimulationEngine {
    SimulationEngine::new(config(stages), Arc::new(field)).unwrap()
}

/// A placed agent in the middle of the grid, 20 m down.
pub fn placed(engine: &StepEngine, type_name: &str, id: u64) -> AgentState {
    engine
        .initialize_position(&AgentState::new(type_name, id).at(-167.5, 55.25, 20.0))
        .unwrap()
}
