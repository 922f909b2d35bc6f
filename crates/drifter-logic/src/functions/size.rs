use super::{finite_parameter, input, unknown_parameter, BehaviorFunction, FunctionOutput};
use crate::error::ConfigError;
use crate::random::RandomSource;

/// Length from weight: `[W (µg)] → (W/pAlpha)^(1/pBeta)` mm.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthAtWeight {
    pub p_alpha: f64,
    pub p_beta: f64,
}

impl Default for LengthAtWeight {
    fn default() -> Self {
        Self {
            p_alpha: 0.1674,
            p_beta: 3.837,
        }
    }
}

impl LengthAtWeight {
    pub const NAME: &'static str = "lengthAtWeight";
}

impl BehaviorFunction for LengthAtWeight {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["pAlpha", "pBeta"]
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "pAlpha" => Some(self.p_alpha),
            "pBeta" => Some(self.p_beta),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let value = finite_parameter(Self::NAME, name, value)?;
        match name {
            "pAlpha" => self.p_alpha = value,
            "pBeta" => self.p_beta = value,
            _ => return Err(unknown_parameter(Self::NAME, name)),
        }
        Ok(())
    }

    fn evaluate(&self, inputs: &[f64], _random: &mut dyn RandomSource) -> FunctionOutput {
        let w = input(inputs, 0);
        FunctionOutput::Scalar((w / self.p_alpha).powf(1.0 / self.p_beta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::NoNoise;

    #[test]
    fn test_identity_at_alpha() {
        let f = LengthAtWeight::default();
        let l = f.evaluate(&[0.1674], &mut NoNoise).value();
        assert!((l - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_monotone_in_weight() {
        let f = LengthAtWeight::default();
        let a = f.evaluate(&[100.0], &mut NoNoise).value();
        let b = f.evaluate(&[1000.0], &mut NoNoise).value();
        assert!(b > a);
    }

    #[test]
    fn test_negative_weight_fails_check() {
        let f = LengthAtWeight::default();
        assert!(f.evaluate_checked(&[-1.0], &mut NoNoise).is_err());
    }
}
