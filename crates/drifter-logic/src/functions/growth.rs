//! Growth variants.
//!
//! Size-based variants (`exponential`, `linear`, `constant`) update length in
//! millimetres directly. The `consumption` variant is a bioenergetic budget
//! in micrograms per day; size is then derived from weight through a
//! [`LengthAtWeight`] relation.

use super::{
    configure, finite_parameter, input, unknown_parameter, BehaviorFunction, FunctionOutput,
    FunctionSpec, LengthAtWeight,
};
use crate::constants::MICROGRAMS_PER_GRAM;
use crate::error::{ConfigError, NumericError, NumericResult};
use crate::random::RandomSource;

/// `[dtDays, z0] → z0·exp(rate·dtDays)`
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialGrowth {
    pub rate: f64,
}

impl ExponentialGrowth {
    pub const NAME: &'static str = "exponential";

    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl BehaviorFunction for ExponentialGrowth {
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

    fn evaluate(&self, inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        let dt_days = input(inputs, 0);
        let z0 = input(inputs, 1);
        FunctionOutput::Scalar(z0 * (self.rate * dt_days).exp())
    }
}

/// `[dtDays, z0] → z0 + rate·dtDays`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGrowth {
    pub rate: f64,
}

impl LinearGrowth {
    pub const NAME: &'static str = "linear";

    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl BehaviorFunction for LinearGrowth {
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

    fn evaluate(&self, inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        let dt_days = input(inputs, 0);
        let z0 = input(inputs, 1);
        FunctionOutput::Scalar(z0 + self.rate * dt_days)
    }
}

/// `[] → rate`. Shared by the growth and mortality categories.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRate {
    pub rate: f64,
}

impl ConstantRate {
    pub const NAME: &'static str = "constant";

    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl BehaviorFunction for ConstantRate {
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

/// Bioenergetic growth: consumption minus metabolic costs.
///
/// Inputs `[W (µg), T (°C), L (1 = light, 0 = dark)]`; output
/// `[G, C, AE, metRst, metAct, TC]`, all µg/day except the dimensionless
/// assimilation efficiency `AE`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthByConsumption {
    pub p_cexp: f64,
    /// Non-zero enables the Q10 temperature correction.
    pub p_on_t: f64,
    pub p_ln_q10: f64,
    pub p_t0: f64,
    pub stdv_cons: f64,
    pub max_ae: f64,
    pub p_b: f64,
    pub p_met_rst_num: f64,
    pub p_met_rst_den: f64,
    pub p_act_mult: f64,
    pub p_sdae: f64,
}

impl Default for GrowthByConsumption {
    fn default() -> Self {
        Self {
            p_cexp: 0.894,
            p_on_t: 0.0,
            p_ln_q10: 2.0,
            p_t0: 4.5,
            stdv_cons: 0.0,
            max_ae: 0.80,
            p_b: 0.002,
            p_met_rst_num: 4500.0,
            p_met_rst_den: 45000.0,
            p_act_mult: 2.5,
            p_sdae: 0.30,
        }
    }
}

const CONSUMPTION_PARAMS: &[&str] = &[
    "pCexp",
    "pOnT",
    "pLnQ10",
    "pT0",
    "stdvCons",
    "maxAE",
    "pB",
    "pMetRstNum",
    "pMetRstDen",
    "pActMult",
    "pSDAE",
];

impl GrowthByConsumption {
    pub const NAME: &'static str = "consumption";

    fn slot(&mut self, name: &str) -> Option<&mut f64> {
        Some(match name {
            "pCexp" => &mut self.p_cexp,
            "pOnT" => &mut self.p_on_t,
            "pLnQ10" => &mut self.p_ln_q10,
            "pT0" => &mut self.p_t0,
            "stdvCons" => &mut self.stdv_cons,
            "maxAE" => &mut self.max_ae,
            "pB" => &mut self.p_b,
            "pMetRstNum" => &mut self.p_met_rst_num,
            "pMetRstDen" => &mut self.p_met_rst_den,
            "pActMult" => &mut self.p_act_mult,
            "pSDAE" => &mut self.p_sdae,
            _ => return None,
        })
    }
}

impl BehaviorFunction for GrowthByConsumption {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        CONSUMPTION_PARAMS
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        Some(match name {
            "pCexp" => self.p_cexp,
            "pOnT" => self.p_on_t,
            "pLnQ10" => self.p_ln_q10,
            "pT0" => self.p_t0,
            "stdvCons" => self.stdv_cons,
            "maxAE" => self.max_ae,
            "pB" => self.p_b,
            "pMetRstNum" => self.p_met_rst_num,
            "pMetRstDen" => self.p_met_rst_den,
            "pActMult" => self.p_act_mult,
            "pSDAE" => self.p_sdae,
            _ => return None,
        })
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let value = finite_parameter(Self::NAME, name, value)?;
        match self.slot(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(unknown_parameter(Self::NAME, name)),
        }
    }

    fn evaluate(&self, inputs: &[f64], random: &mut dyn RandomSource) -> FunctionOutput {
        let w = input(inputs, 0);
        let t = input(inputs, 1);
        let light = input(inputs, 2);

        let mut c = 10f64.powf(self.p_cexp * w.log10() - 0.27);
        if self.p_on_t != 0.0 {
            c *= (self.p_ln_q10 / 10.0 * (t - self.p_t0)).exp();
        }
        if self.stdv_cons > 0.0 {
            c += random.normal_variate() * self.stdv_cons;
        }
        let ae = self.max_ae * (1.0 - 0.25 * (-self.p_b * (w - 10.0)).exp());
        let met_rst = self.p_met_rst_num * w / (self.p_met_rst_den + w);
        let met_act = self.p_act_mult * met_rst;
        let tc = (1.0 - light) * met_rst + light * met_act + self.p_sdae * c;
        let g = c * ae - tc;
        FunctionOutput::Vector(vec![g, c, ae, met_rst, met_act, tc])
    }
}

/// Growth category, resolved once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthFunction {
    Exponential(ExponentialGrowth),
    Linear(LinearGrowth),
    Constant(ConstantRate),
    Consumption(GrowthByConsumption),
}

/// Biological state before or after a growth update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Length (mm).
    pub size: f64,
    /// Wet weight (g).
    pub weight: f64,
}

impl GrowthFunction {
    pub fn from_spec(spec: &FunctionSpec) -> Result<Self, ConfigError> {
        match spec.kind.as_str() {
            ExponentialGrowth::NAME => Ok(Self::Exponential(configure(
                ExponentialGrowth::new(0.0),
                spec,
                &["rate"],
            )?)),
            LinearGrowth::NAME => Ok(Self::Linear(configure(LinearGrowth::new(0.0), spec, &["rate"])?)),
            ConstantRate::NAME => Ok(Self::Constant(configure(ConstantRate::new(0.0), spec, &["rate"])?)),
            GrowthByConsumption::NAME => Ok(Self::Consumption(configure(
                GrowthByConsumption::default(),
                spec,
                &[],
            )?)),
            other => Err(ConfigError::UnknownFunction {
                category: "growth".into(),
                kind: other.into(),
            }),
        }
    }

    fn inner(&self) -> &dyn BehaviorFunction {
        match self {
            Self::Exponential(f) => f,
            Self::Linear(f) => f,
            Self::Constant(f) => f,
            Self::Consumption(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BehaviorFunction {
        match self {
            Self::Exponential(f) => f,
            Self::Linear(f) => f,
            Self::Constant(f) => f,
            Self::Consumption(f) => f,
        }
    }

    /// Advance `body` by `dt_days`. Size variants leave weight untouched;
    /// the consumption variant updates weight and re-derives size.
    pub fn grow(
        &self,
        body: Body,
        temperature: f64,
        daylight: bool,
        dt_days: f64,
        length_at_weight: &LengthAtWeight,
        random: &mut dyn RandomSource,
    ) -> NumericResult<Body> {
        match self {
            Self::Exponential(_) | Self::Linear(_) => {
                let size = self.evaluate_checked(&[dt_days, body.size], random)?.value();
                Ok(Body { size, ..body })
            }
            Self::Constant(_) => {
                let rate = self.evaluate_checked(&[], random)?.value();
                Ok(Body {
                    size: body.size + rate * dt_days,
                    ..body
                })
            }
            Self::Consumption(_) => {
                let w_ug = body.weight * MICROGRAMS_PER_GRAM;
                let light = if daylight { 1.0 } else { 0.0 };
                let g = self.evaluate_checked(&[w_ug, temperature, light], random)?.value();
                let w_next = w_ug + g * dt_days;
                if w_next <= 0.0 {
                    return Err(NumericError::transform("consumption weight", &[w_ug, g, dt_days]));
                }
                let size = length_at_weight.evaluate_checked(&[w_next], random)?.value();
                Ok(Body {
                    size,
                    weight: w_next / MICROGRAMS_PER_GRAM,
                })
            }
        }
    }
}

impl BehaviorFunction for GrowthFunction {
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
