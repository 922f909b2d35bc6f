use super::{
    configure, finite_parameter, input, unknown_parameter, BehaviorFunction, ConstantRate,
    FunctionOutput, FunctionSpec,
};
use crate::error::{ConfigError, NumericError, NumericResult};
use crate::random::RandomSource;
use crate::transition::{decay_abundance, Abundance, StageLimits};

/// Temperature-dependent mortality after Houde (1989): `[T] → a + b·T` per day.
#[derive(Debug, Clone, PartialEq)]
pub struct Houde1989Mortality {
    pub a: f64,
    pub b: f64,
}

impl Default for Houde1989Mortality {
    fn default() -> Self {
        Self { a: 0.0256, b: 0.0123 }
    }
}

impl Houde1989Mortality {
    pub const NAME: &'static str = "houde1989";
}

impl BehaviorFunction for Houde1989Mortality {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["a", "b"]
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "a" => Some(self.a),
            "b" => Some(self.b),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let value = finite_parameter(Self::NAME, name, value)?;
        match name {
            "a" => self.a = value,
            "b" => self.b = value,
            _ => return Err(unknown_parameter(Self::NAME, name)),
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        FunctionOutput::Scalar(self.a + self.b * input(inputs, 0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MortalityFunction {
    Constant(ConstantRate),
    Houde1989(Houde1989Mortality),
}

impl MortalityFunction {
    pub fn from_spec(spec: &FunctionSpec) -> Result<Self, ConfigError> {
        match spec.kind.as_str() {
            ConstantRate::NAME => Ok(Self::Constant(configure(ConstantRate::new(0.0), spec, &["rate"])?)),
            Houde1989Mortality::NAME => Ok(Self::Houde1989(configure(
                Houde1989Mortality::default(),
                spec,
                &[],
            )?)),
            other => Err(ConfigError::UnknownFunction {
                category: "mortality".into(),
                kind: other.into(),
            }),
        }
    }

    fn inner(&self) -> &dyn BehaviorFunction {
        match self {
            Self::Constant(f) => f,
            Self::Houde1989(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BehaviorFunction {
        match self {
            Self::Constant(f) => f,
            Self::Houde1989(f) => f,
        }
    }

    /// Instantaneous mortality rate (per day) at `temperature`.
    pub fn daily_rate(&self, temperature: f64, random: &mut dyn RandomSource) -> NumericResult<f64> {
        let out = match self {
            Self::Constant(_) => self.evaluate_checked(&[], random)?,
            Self::Houde1989(_) => self.evaluate_checked(&[temperature], random)?,
        };
        Ok(out.value())
    }

    /// One step of abundance decay at `temperature`. A rate that is finite
    /// but large enough to overflow the decay is reported against this
    /// function with inputs `[temperature, ageInStage, dt]`.
    pub fn decay(
        &self,
        abundance: Abundance,
        temperature: f64,
        age_in_stage: f64,
        limits: &StageLimits,
        dt: f64,
        random: &mut dyn RandomSource,
    ) -> NumericResult<Abundance> {
        let rate = self.daily_rate(temperature, random)?;
        let out = decay_abundance(abundance, age_in_stage, rate, limits, dt);
        match [out.number, out.num_trans].into_iter().find(|v| !v.is_finite()) {
            None => Ok(out),
            Some(value) => Err(NumericError::Function {
                function: self.name().to_string(),
                inputs: vec![temperature, age_in_stage, dt],
                value,
            }),
        }
    }
}

impl BehaviorFunction for MortalityFunction {
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
