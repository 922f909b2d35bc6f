use super::{
    configure, finite_parameter, input, unknown_parameter, BehaviorFunction, FunctionOutput,
    FunctionSpec,
};
use crate::error::{ConfigError, NumericResult};
use crate::random::RandomSource;

/// `[dt, size] → coefficient·size^exponent` m/s.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerLawSwimming {
    pub coefficient: f64,
    pub exponent: f64,
}

impl PowerLawSwimming {
    pub const NAME: &'static str = "powerLaw";

    pub fn new(coefficient: f64, exponent: f64) -> Self {
        Self {
            coefficient,
            exponent,
        }
    }
}

impl BehaviorFunction for PowerLawSwimming {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["coefficient", "exponent"]
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "coefficient" => Some(self.coefficient),
            "exponent" => Some(self.exponent),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let value = finite_parameter(Self::NAME, name, value)?;
        match name {
            "coefficient" => self.coefficient = value,
            "exponent" => self.exponent = value,
            _ => return Err(unknown_parameter(Self::NAME, name)),
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        let size = input(inputs, 1);
        FunctionOutput::Scalar(self.coefficient * size.powf(self.exponent))
    }
}

/// `[dt] → rate` m/s.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSwimming {
    pub rate: f64,
}

impl ConstantSwimming {
    pub const NAME: &'static str = "constant";
}

impl BehaviorFunction for ConstantSwimming {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["rate"]
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "rate" => Some(self.rate),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        match name {
            "rate" => self.rate = finite_parameter(Self::NAME, name, value)?,
            _ => return Err(unknown_parameter(Self::NAME, name)),
        }
        Ok(())
    }

    fn evaluate(&self, _inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        FunctionOutput::Scalar(self.rate)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwimmingFunction {
    PowerLaw(PowerLawSwimming),
    Constant(ConstantSwimming),
}

impl SwimmingFunction {
    pub fn from_spec(spec: &FunctionSpec) -> Result<Self, ConfigError> {
        match spec.kind.as_str() {
            PowerLawSwimming::NAME => Ok(Self::PowerLaw(configure(
                PowerLawSwimming::new(0.0, 0.0),
                spec,
                &["coefficient", "exponent"],
            )?)),
            ConstantSwimming::NAME => Ok(Self::Constant(configure(
                ConstantSwimming { rate: 0.0 },
                spec,
                &["rate"],
            )?)),
            other => Err(ConfigError::UnknownFunction {
                category: "swimming".into(),
                kind: other.into(),
            }),
        }
    }

    fn inner(&self) -> &dyn BehaviorFunction {
        match self {
            Self::PowerLaw(f) => f,
            Self::Constant(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BehaviorFunction {
        match self {
            Self::PowerLaw(f) => f,
            Self::Constant(f) => f,
        }
    }

    /// Swimming speed (m/s) for an individual of length `size`.
    pub fn speed(&self, dt: f64, size: f64, random: &mut dyn RandomSource) -> NumericResult<f64> {
        let out = match self {
            Self::PowerLaw(_) => self.evaluate_checked(&[dt, size], random)?,
            Self::Constant(_) => self.evaluate_checked(&[dt], random)?,
        };
        Ok(out.value())
    }
}

impl BehaviorFunction for SwimmingFunction {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        self.inner().parameter_names()
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        self.inner().parameter(name)
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        self.inner_mut().set_parameter(name, value)
    }

    fn evaluate(&self, inputs: &[f64], random: &mut dyn RandomSource) -> FunctionOutput {
        self.inner().evaluate(inputs, random)
    }
}
