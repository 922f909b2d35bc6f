//! Drifter Core - life-stage agents drifting through a circulation field
//!
//! A population of individuals and super-individuals (one agent standing
//! for many organisms) is advected by ocean currents, grows, dies, and moves
//! through a chain of life stages.
//!
//! # Architecture
//!
//! The population lives in a `hecs` world:
//! - **Components**: [`AgentState`](components::AgentState) and its persisted
//!   [`AttributeRecord`](components::AttributeRecord)
//! - **Systems**: the per-agent [`StepEngine`](systems::StepEngine) and the
//!   sequential / parallel population systems that drive it
//! - **Environment**: read-only [`EnvironmentField`](environment::EnvironmentField)
//!
//! Pure numerics (tracker, behaviour functions, transition rules) live in
//! `drifter-logic`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drifter_core::prelude::*;
//!
//! let json = std::fs::read_to_string("run.json").unwrap();
//! let field = Arc::new(RectilinearField::default());
//! let mut engine = SimulationEngine::from_json_str(&json, field).unwrap();
//!
//! engine.release(AgentState::new("Larva", 0).at(-168.0, 55.0, 20.0)).unwrap();
//! let report = engine.run(24);
//! println!("{} failures", report.failures.len());
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod persistence;
pub mod stages;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{SimulationConfig, StageConfig};
    pub use crate::engine::SimulationEngine;
    pub use crate::environment::{EnvironmentField, RectilinearField};
    pub use crate::error::{DriftError, StepError};
    pub use crate::systems::{StepEngine, StepResult, UpdateReport};
}
