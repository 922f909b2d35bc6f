//! Stage registry: life-stage parameters keyed by type name, built and
//! checked once at startup.

use std::collections::BTreeMap;

use drifter_logic::error::ConfigError;
use drifter_logic::functions::{
    BehaviorFunction, GrowthFunction, InitialConditionFunction, LengthAtWeight, MortalityFunction,
    SwimmingFunction,
};
use drifter_logic::transition::StageLimits;

use crate::components::FIELD_DELIMITER;
use crate::config::StageConfig;

/// A configured life stage with its behaviour functions resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub next_stage: Option<String>,
    pub super_individual: bool,
    pub attached: bool,
    pub limits: StageLimits,
    pub horizontal_random_walk: f64,
    pub growth: GrowthFunction,
    pub mortality: MortalityFunction,
    pub swimming: Option<SwimmingFunction>,
    pub length_at_weight: LengthAtWeight,
    /// Stage-specific attribute names, in row order.
    pub extra_attributes: Vec<String>,
    pub initial_condition: Option<InitialConditionFunction>,
}

impl Stage {
    pub fn from_config(cfg: &StageConfig) -> Result<Self, ConfigError> {
        if cfg.name.is_empty() || cfg.name.contains(FIELD_DELIMITER) || cfg.name.contains('\n') {
            return Err(ConfigError::invalid("stage name", &cfg.name, "not a usable type name"));
        }
        let field = |f: &str| format!("{}.{}", cfg.name, f);
        for (name, value) in [
            ("min_stage_duration", cfg.min_stage_duration),
            ("min_size", cfg.min_size),
            ("stage_transition_rate", cfg.stage_transition_rate),
            ("horizontal_random_walk", cfg.horizontal_random_walk),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field(name), value, "must be finite"));
            }
        }
        if cfg.max_stage_duration.is_nan() {
            return Err(ConfigError::invalid(field("max_stage_duration"), cfg.max_stage_duration, "must be a number"));
        }
        if cfg.min_stage_duration > cfg.max_stage_duration {
            return Err(ConfigError::invalid(
                field("min_stage_duration"),
                cfg.min_stage_duration,
                "exceeds max_stage_duration",
            ));
        }
        if cfg.horizontal_random_walk < 0.0 {
            return Err(ConfigError::invalid(field("horizontal_random_walk"), cfg.horizontal_random_walk, "must be non-negative"));
        }

        let length_at_weight = match &cfg.length_at_weight {
            None => LengthAtWeight::default(),
            Some(spec) if spec.kind == LengthAtWeight::NAME => {
                let mut f = LengthAtWeight::default();
                for (name, value) in &spec.params {
                    f.set_parameter(name, *value)?;
                }
                f
            }
            Some(spec) => {
                return Err(ConfigError::UnknownFunction {
                    category: "size".into(),
                    kind: spec.kind.clone(),
                })
            }
        };

        for (idx, name) in cfg.extra_attributes.iter().enumerate() {
            if name.is_empty() || name.contains(FIELD_DELIMITER) || name.contains('\n') {
                return Err(ConfigError::invalid(field("extra_attributes"), name, "not a usable column name"));
            }
            if cfg.extra_attributes[..idx].contains(name) {
                return Err(ConfigError::invalid(field("extra_attributes"), name, "listed twice"));
            }
        }
        let initial_condition = cfg
            .initial_condition
            .as_ref()
            .map(InitialConditionFunction::from_spec)
            .transpose()?;
        if let Some(f) = &initial_condition {
            if !cfg.extra_attributes.iter().any(|a| a == f.target()) {
                return Err(ConfigError::invalid(
                    field("initial_condition"),
                    f.name(),
                    format!("'{}' is not one of the stage's extra attributes", f.target()),
                ));
            }
        }

        Ok(Self {
            name: cfg.name.clone(),
            next_stage: cfg.next_stage.clone(),
            super_individual: cfg.super_individual,
            attached: cfg.attached,
            limits: StageLimits {
                min_stage_duration: cfg.min_stage_duration,
                max_stage_duration: cfg.max_stage_duration,
                min_size: cfg.min_size,
                stage_transition_rate: cfg.stage_transition_rate,
            },
            horizontal_random_walk: cfg.horizontal_random_walk,
            growth: GrowthFunction::from_spec(&cfg.growth)?,
            mortality: MortalityFunction::from_spec(&cfg.mortality)?,
            swimming: cfg
                .swimming
                .as_ref()
                .map(SwimmingFunction::from_spec)
                .transpose()?,
            length_at_weight,
            extra_attributes: cfg.extra_attributes.clone(),
            initial_condition,
        })
    }
}

/// Life stages by type name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRegistry {
    stages: BTreeMap<String, Stage>,
}

impl StageRegistry {
    pub fn from_config(configs: &[StageConfig]) -> Result<Self, ConfigError> {
        let mut stages = BTreeMap::new();
        for cfg in configs {
            let stage = Stage::from_config(cfg)?;
            if stages.insert(stage.name.clone(), stage).is_some() {
                return Err(ConfigError::DuplicateStage(cfg.name.clone()));
            }
        }
        for stage in stages.values() {
            if let Some(next) = &stage.next_stage {
                if !stages.contains_key(next) {
                    return Err(ConfigError::UnknownStage(next.clone()));
                }
            }
        }
        Ok(Self { stages })
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Stage, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownStage(name.to_string()))
    }

    /// Every stage's extra attributes, first occurrence first, stages in
    /// name order.
    pub fn extra_attributes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.stages.values().flat_map(|s| &s.extra_attributes) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
