//! Error types for the numeric core.
//!
//! Configuration problems are fatal at setup. Numeric problems abort a
//! single agent's step and carry enough context to say which function and
//! inputs produced the bad value.

use thiserror::Error;

/// Result alias for numeric evaluation.
pub type NumericResult<T> = std::result::Result<T, NumericError>;

/// Missing or invalid setup (behaviour function parameters, stage limits).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown {category} function kind '{kind}'")]
    UnknownFunction { category: String, kind: String },
    #[error("function '{function}' has no parameter '{name}'")]
    UnknownParameter { function: String, name: String },
    #[error("function '{function}' requires parameter '{name}'")]
    MissingParameter { function: String, name: String },
    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("unknown life stage '{0}'")]
    UnknownStage(String),
    #[error("duplicate life stage '{0}'")]
    DuplicateStage(String),
}

impl ConfigError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// A non-finite value produced during a step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericError {
    /// A behaviour function returned NaN or infinity.
    #[error("function '{function}' produced {value} from inputs {inputs:?}")]
    Function {
        function: String,
        inputs: Vec<f64>,
        value: f64,
    },
    /// A coordinate transform or field interpolation returned NaN or infinity.
    #[error("{operation} produced non-finite result at {at:?}")]
    Transform { operation: String, at: Vec<f64> },
}

impl NumericError {
    pub fn transform(operation: impl Into<String>, at: &[f64]) -> Self {
        NumericError::Transform {
            operation: operation.into(),
            at: at.to_vec(),
        }
    }
}

/// Return `value` if finite, otherwise a transform error naming `operation`.
pub fn finite(value: f64, operation: &str, at: &[f64]) -> NumericResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumericError::transform(operation, at))
    }
}
