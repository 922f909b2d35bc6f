use super::{
    configure, finite_parameter, input, unknown_parameter, BehaviorFunction, FunctionOutput,
    FunctionSpec,
};
use crate::error::{ConfigError, NumericResult};
use crate::random::RandomSource;

/// Initial oil globule volume of a larva from maternal effects:
/// `[A (years), W (week of year)] → c0 + c1·A + c2·W + N(0,1)·sigOGV`.
/// No draw is taken when `sigOGV` is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MaternalOgv {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    pub sig_ogv: f64,
}

impl Default for MaternalOgv {
    fn default() -> Self {
        Self {
            c0: 0.05,
            c1: 0.0007,
            c2: -0.002,
            sig_ogv: 0.0,
        }
    }
}

impl MaternalOgv {
    pub const NAME: &'static str = "maternalOgv";
}

impl BehaviorFunction for MaternalOgv {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["c0", "c1", "c2", "sigOGV"]
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "c0" => Some(self.c0),
            "c1" => Some(self.c1),
            "c2" => Some(self.c2),
            "sigOGV" => Some(self.sig_ogv),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let value = finite_parameter(Self::NAME, name, value)?;
        match name {
            "c0" => self.c0 = value,
            "c1" => self.c1 = value,
            "c2" => self.c2 = value,
            "sigOGV" if value < 0.0 => {
                return Err(ConfigError::invalid("maternalOgv.sigOGV", value, "must be non-negative"))
            }
            "sigOGV" => self.sig_ogv = value,
            _ => return Err(unknown_parameter(Self::NAME, name)),
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64], random: &mut dyn RandomSource) -> FunctionOutput {
        let maternal_age = input(inputs, 0);
        let week = input(inputs, 1);
        let noise = if self.sig_ogv > 0.0 {
            random.normal_variate() * self.sig_ogv
        } else {
            0.0
        };
        FunctionOutput::Scalar(self.c0 + self.c1 * maternal_age + self.c2 * week + noise)
    }
}

/// Sets a stage attribute once, when an agent enters the stage.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialConditionFunction {
    MaternalOgv(MaternalOgv),
}

impl InitialConditionFunction {
    /// Stage attribute holding the maternal age input (years).
    pub const MATERNAL_AGE: &'static str = "maternalAge";
    /// Stage attribute written by [`MaternalOgv`].
    pub const OIL_GLOBULE_VOLUME: &'static str = "oilGlobuleVolume";

    pub fn from_spec(spec: &FunctionSpec) -> Result<Self, ConfigError> {
        match spec.kind.as_str() {
            MaternalOgv::NAME => Ok(Self::MaternalOgv(configure(MaternalOgv::default(), spec, &[])?)),
            other => Err(ConfigError::UnknownFunction {
                category: "initial condition".into(),
                kind: other.into(),
            }),
        }
    }

    /// Attribute the function initialises.
    pub fn target(&self) -> &'static str {
        match self {
            Self::MaternalOgv(_) => Self::OIL_GLOBULE_VOLUME,
        }
    }

    /// Stage attributes the function reads.
    pub fn inputs(&self) -> &'static [&'static str] {
        match self {
            Self::MaternalOgv(_) => &[Self::MATERNAL_AGE],
        }
    }

    fn inner(&self) -> &dyn BehaviorFunction {
        match self {
            Self::MaternalOgv(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BehaviorFunction {
        match self {
            Self::MaternalOgv(f) => f,
        }
    }

    /// Initial value for an agent with `maternal_age` (years) entering the
    /// stage in `week_of_year`.
    pub fn initial_value(
        &self,
        maternal_age: f64,
        week_of_year: f64,
        random: &mut dyn RandomSource,
    ) -> NumericResult<f64> {
        Ok(self
            .evaluate_checked(&[maternal_age, week_of_year], random)?
            .value())
    }
}

impl BehaviorFunction for InitialConditionFunction {
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
