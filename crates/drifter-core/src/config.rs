//! Simulation configuration, read from JSON.
//!
//! ```json
//! {
//!   "time_step_secs": 3600,
//!   "seed": 7,
//!   "covariates": ["chla"],
//!   "stages": [
//!     { "name": "Larva", "next_stage": "Juvenile", "super_individual": true,
//!       "min_stage_duration": 10, "max_stage_duration": 60, "min_size": 12,
//!       "stage_transition_rate": 0.2,
//!       "growth": { "kind": "linear", "params": { "rate": 0.4 } },
//!       "mortality": { "kind": "houde1989" },
//!       "swimming": { "kind": "powerLaw", "params": { "coefficient": 0.001, "exponent": 1.0 } },
//!       "extra_attributes": ["maternalAge", "oilGlobuleVolume"],
//!       "initial_condition": { "kind": "maternalOgv" } }
//!   ]
//! }
//! ```

use drifter_logic::functions::FunctionSpec;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Default step length (s) for [`run`](crate::engine::SimulationEngine::run).
    #[serde(default = "default_time_step")]
    pub time_step_secs: f64,
    /// Base seed for every random stream.
    #[serde(default)]
    pub seed: u64,
    /// Calendar year of simulation time 0 (for day/night).
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,
    /// Grid-index distance from the boundary at which agents leave.
    #[serde(default = "default_edge_tolerance")]
    pub grid_edge_tolerance: f64,
    /// Extra environment fields sampled onto every agent.
    #[serde(default)]
    pub covariates: Vec<String>,
    pub stages: Vec<StageConfig>,
}

fn default_time_step() -> f64 {
    3600.0
}

fn default_reference_year() -> i32 {
    2000
}

fn default_edge_tolerance() -> f64 {
    0.5
}

fn default_max_duration() -> f64 {
    f64::MAX
}

/// Parameters of one life stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    /// Stage that transitioning agents move into; none means terminal.
    #[serde(default)]
    pub next_stage: Option<String>,
    #[serde(default)]
    pub super_individual: bool,
    /// Agents of this stage sit on the bottom and do not advect.
    #[serde(default)]
    pub attached: bool,
    /// Days.
    #[serde(default)]
    pub min_stage_duration: f64,
    /// Days.
    #[serde(default = "default_max_duration")]
    pub max_stage_duration: f64,
    /// mm.
    #[serde(default)]
    pub min_size: f64,
    /// Per day.
    #[serde(default)]
    pub stage_transition_rate: f64,
    /// Horizontal random-walk parameter (m²/s).
    #[serde(default)]
    pub horizontal_random_walk: f64,
    pub growth: FunctionSpec,
    pub mortality: FunctionSpec,
    #[serde(default)]
    pub swimming: Option<FunctionSpec>,
    #[serde(default)]
    pub length_at_weight: Option<FunctionSpec>,
    /// Real-valued attributes only agents of this stage carry, such as
    /// `maternalAge`.
    #[serde(default)]
    pub extra_attributes: Vec<String>,
    /// Sets one of `extra_attributes` when an agent enters the stage.
    #[serde(default)]
    pub initial_condition: Option<FunctionSpec>,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
