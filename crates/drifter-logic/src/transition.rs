//! Stage transition policy: eligibility, abundance decay, and timeout.
//!
//! These are the pure rules; the step engine applies them to an agent and
//! builds successors.

use serde::{Deserialize, Serialize};

use crate::constants::{DAY_SECS, TRANSITION_LOOKAHEAD};

/// Lifecycle state of an agent within its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Active,
    Transitioned,
    Dead,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Active => "Active",
            LifecycleState::Transitioned => "Transitioned",
            LifecycleState::Dead => "Dead",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Active" => Some(LifecycleState::Active),
            "Transitioned" => Some(LifecycleState::Transitioned),
            "Dead" => Some(LifecycleState::Dead),
            _ => None,
        }
    }
}

/// Per-stage limits and rates that drive the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageLimits {
    /// Days.
    pub min_stage_duration: f64,
    /// Days.
    pub max_stage_duration: f64,
    /// mm.
    pub min_size: f64,
    /// Per day.
    pub stage_transition_rate: f64,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            min_stage_duration: 0.0,
            max_stage_duration: f64::MAX,
            min_size: 0.0,
            stage_transition_rate: 0.0,
        }
    }
}

/// Ready to leave the stage: old enough (looking a quarter step ahead) and
/// big enough.
pub fn is_transition_eligible(age_in_stage: f64, size: f64, dt: f64, limits: &StageLimits) -> bool {
    age_in_stage + TRANSITION_LOOKAHEAD * dt / DAY_SECS >= limits.min_stage_duration
        && size >= limits.min_size
}

/// Exceeded the maximum time allowed in the stage.
pub fn is_timed_out(age_in_stage: f64, limits: &StageLimits) -> bool {
    age_in_stage > limits.max_stage_duration
}

/// Represented count and the pending transitioning sub-count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abundance {
    pub number: f64,
    pub num_trans: f64,
}

/// Apply one step of mortality, and of transition once the stage minimum
/// has been reached. Rates are per day, `dt` in seconds.
pub fn decay_abundance(
    abundance: Abundance,
    age_in_stage: f64,
    mortality_rate: f64,
    limits: &StageLimits,
    dt: f64,
) -> Abundance {
    let Abundance {
        mut number,
        mut num_trans,
    } = abundance;
    let mut total_rate = mortality_rate;
    if age_in_stage >= limits.min_stage_duration {
        total_rate += limits.stage_transition_rate;
        let entering = if total_rate == 0.0 {
            0.0
        } else {
            (limits.stage_transition_rate / total_rate)
                * number
                * (1.0 - (-dt * total_rate / DAY_SECS).exp())
        };
        num_trans = num_trans * (-dt * mortality_rate / DAY_SECS).exp() + entering;
    }
    number *= (-dt * total_rate / DAY_SECS).exp();
    Abundance { number, num_trans }
}

/// What an eligible agent does this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Stay in the stage.
    Stay,
    /// Super-individual: split `num_trans` off into a new agent.
    Split,
    /// Individual: the whole agent moves to the next stage.
    Whole,
}

pub fn transition_kind(
    eligible: bool,
    has_next_stage: bool,
    super_individual: bool,
    num_trans: f64,
) -> TransitionKind {
    if !eligible || !has_next_stage {
        TransitionKind::Stay
    } else if super_individual {
        if num_trans > 0.0 {
            TransitionKind::Split
        } else {
            TransitionKind::Stay
        }
    } else {
        TransitionKind::Whole
    }
}
