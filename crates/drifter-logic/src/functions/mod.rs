//! Behaviour functions: named, parameterised numeric processes.
//!
//! Every process (growth, mortality, swimming speed, length-at-weight,
//! initial conditions) is a [`BehaviorFunction`]: a pure function of a
//! short input vector whose coefficients live in a named parameter table. Stochastic terms draw from
//! the [`RandomSource`] passed to `evaluate`.
//!
//! The variant for each category is chosen once, when a [`FunctionSpec`] is
//! built into a [`GrowthFunction`], [`MortalityFunction`] or
//! [`SwimmingFunction`]; stepping never inspects concrete types.

mod growth;
mod initial;
mod mortality;
mod size;
mod swimming;

pub use growth::*;
pub use initial::*;
pub use mortality::*;
pub use size::*;
pub use swimming::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NumericError, NumericResult};
use crate::random::RandomSource;

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl FunctionOutput {
    /// The scalar value, or the first component of a vector.
    pub fn value(&self) -> f64 {
        match self {
            FunctionOutput::Scalar(v) => *v,
            FunctionOutput::Vector(v) => v.first().copied().unwrap_or(f64::NAN),
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            FunctionOutput::Scalar(v) => std::slice::from_ref(v),
            FunctionOutput::Vector(v) => v,
        }
    }

    fn first_non_finite(&self) -> Option<f64> {
        self.values().iter().copied().find(|v| !v.is_finite())
    }
}

/// Capability shared by all behaviour functions.
pub trait BehaviorFunction {
    /// Kind key used in configuration, e.g. `"exponential"`.
    fn name(&self) -> &'static str;

    /// Declared parameter names, in display order.
    fn parameter_names(&self) -> &'static [&'static str];

    fn parameter(&self, name: &str) -> Option<f64>;

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError>;

    /// Evaluate without checking the result.
    fn evaluate(&self, inputs: &[f64], random: &mut dyn RandomSource) -> FunctionOutput;

    /// Evaluate and reject NaN or infinite results.
    fn evaluate_checked(
        &self,
        inputs: &[f64],
        random: &mut dyn RandomSource,
    ) -> NumericResult<FunctionOutput> {
        let out = self.evaluate(inputs, random);
        match out.first_non_finite() {
            None => Ok(out),
            Some(value) => Err(NumericError::Function {
                function: self.name().to_string(),
                inputs: inputs.to_vec(),
                value,
            }),
        }
    }

    /// Snapshot of the parameter table.
    fn parameters(&self) -> BTreeMap<String, f64> {
        self.parameter_names()
            .iter()
            .filter_map(|n| self.parameter(n).map(|v| (n.to_string(), v)))
            .collect()
    }
}

/// Configuration form of a behaviour function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl FunctionSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// Input `idx`, or NaN when the caller supplied too few inputs (surfaces as
/// a numeric error from `evaluate_checked`).
pub(crate) fn input(inputs: &[f64], idx: usize) -> f64 {
    inputs.get(idx).copied().unwrap_or(f64::NAN)
}

pub(crate) fn finite_parameter(function: &str, name: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            format!("{}.{}", function, name),
            value,
            "parameter must be finite",
        ))
    }
}

pub(crate) fn unknown_parameter(function: &str, name: &str) -> ConfigError {
    ConfigError::UnknownParameter {
        function: function.to_string(),
        name: name.to_string(),
    }
}

/// Apply every parameter in `spec` to `function`, after checking that all
/// `required` names are present.
pub(crate) fn configure<F: BehaviorFunction>(
    mut function: F,
    spec: &FunctionSpec,
    required: &[&str],
) -> Result<F, ConfigError> {
    for name in required {
        if !spec.params.contains_key(*name) {
            return Err(ConfigError::MissingParameter {
                function: function.name().to_string(),
                name: name.to_string(),
            });
        }
    }
    for (name, value) in &spec.params {
        function.set_parameter(name, *value)?;
    }
    Ok(function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::NoNoise;

    #[test]
    fn test_output_value() {
        assert_eq!(FunctionOutput::Scalar(2.0).value(), 2.0);
        assert_eq!(FunctionOutput::Vector(vec![3.0, 4.0]).value(), 3.0);
        assert!(FunctionOutput::Vector(vec![]).value().is_nan());
    }

    #[test]
    fn test_checked_rejects_short_inputs() {
        let f = LinearGrowth::new(1.0);
        let err = f.evaluate_checked(&[1.0], &mut NoNoise).unwrap_err();
        match err {
            NumericError::Function { function, inputs, .. } => {
                assert_eq!(function, "linear");
                assert_eq!(inputs, vec![1.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parameters_snapshot() {
        let f = ExponentialGrowth::new(0.1);
        let params = f.parameters();
        assert_eq!(params.get("rate"), Some(&0.1));
    }
}
