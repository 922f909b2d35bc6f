//! Error types for the engine.
//!
//! - [`ConfigError`] and [`DriftError::MalformedRecord`] abort the operation
//!   that raised them (startup, record ingestion).
//! - [`StepError`] aborts one agent's step only; the batch carries on.
//! - Leaving the grid is not an error; it is recorded on the agent.

use drifter_logic::error::{ConfigError, NumericError};
use thiserror::Error;

use crate::components::AttributeKind;

pub type Result<T> = std::result::Result<T, DriftError>;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Step(#[from] StepError),

    /// An attribute row failed to parse. `row` holds every raw field of the
    /// offending row.
    #[error("malformed record: field '{field}' = '{value}' ({reason}); row: {row:?}")]
    MalformedRecord {
        field: String,
        value: String,
        reason: String,
        row: Vec<String>,
    },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("attribute '{key}' expects a {expected:?} value")]
    AttributeKind { key: String, expected: AttributeKind },

    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl DriftError {
    pub(crate) fn malformed(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
        row: &[&str],
    ) -> Self {
        DriftError::MalformedRecord {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            row: row.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Why a step was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A rejected step, attributable to one agent and timestep. The agent's
/// state was left as it was before the step.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("step rejected for agent {agent_id} at t={time}s (dt={dt}s): {failure}")]
pub struct StepError {
    pub agent_id: u64,
    pub time: f64,
    pub dt: f64,
    pub failure: StepFailure,
}

impl StepError {
    pub fn new(agent_id: u64, time: f64, dt: f64, failure: impl Into<StepFailure>) -> Self {
        Self {
            agent_id,
            time,
            dt,
            failure: failure.into(),
        }
    }
}
