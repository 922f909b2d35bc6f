//! Pure numeric logic for the drifter life-stage engine.
//!
//! This crate holds everything that does not need an environment field or
//! an agent store: the predictor-corrector integrator, behaviour functions,
//! transition rules, and solar geometry. Functions take plain data and an
//! explicit random source, so they are unit-testable and safe to call from
//! parallel workers.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Time conversions, look-ahead fraction, position type codes |
//! | [`error`] | Configuration and numeric error types |
//! | [`functions`] | Growth, mortality, swimming and length-at-weight functions |
//! | [`random`] | Seeded normal-variate source, per-worker streams |
//! | [`solar`] | Solar zenith and day/night test |
//! | [`tracker`] | Predictor-corrector advection in grid-index space |
//! | [`transition`] | Eligibility, abundance decay, timeout, lifecycle state |

pub mod constants;
pub mod error;
pub mod functions;
pub mod random;
pub mod solar;
pub mod tracker;
pub mod transition;
