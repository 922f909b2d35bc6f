//! Predictor-corrector particle tracking in grid-index space.
//!
//! Algorithm (two-stage explicit, "predict then average"):
//! 1. Predict: `x* = x + v(x)·dt`
//! 2. Resample velocity at `x*`
//! 3. Correct from the ORIGINAL position: `x' = x + ½(v(x) + v(x*))·dt`
//!
//! Integration direction follows the sign of `dt`, so the same code runs
//! forward and backward in time. Velocities are in grid-index units per
//! second; use [`IndexVelocity::from_metres`] to convert from m/s.

use serde::{Deserialize, Serialize};

use crate::error::{NumericError, NumericResult};

/// Continuous position in grid-index space. `k` runs 0 (bottom) … N (surface).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub i: f64,
    pub j: f64,
    pub k: f64,
}

impl GridPosition {
    pub fn new(i: f64, j: f64, k: f64) -> Self {
        Self { i, j, k }
    }

    pub fn horizontal(&self) -> [f64; 2] {
        [self.i, self.j]
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.i, self.j, self.k]
    }

    pub fn is_finite(&self) -> bool {
        self.i.is_finite() && self.j.is_finite() && self.k.is_finite()
    }

    fn displaced(&self, v: IndexVelocity, dt: f64) -> Self {
        Self {
            i: self.i + v.u * dt,
            j: self.j + v.v * dt,
            k: self.k + v.w * dt,
        }
    }
}

/// Velocity in grid-index units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexVelocity {
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl IndexVelocity {
    pub const ZERO: Self = Self {
        u: 0.0,
        v: 0.0,
        w: 0.0,
    };

    pub fn new(u: f64, v: f64, w: f64) -> Self {
        Self { u, v, w }
    }

    /// Convert a velocity in m/s using the local grid spacing (metres per
    /// index unit along i, j, k).
    pub fn from_metres(velocity: [f64; 3], spacing: [f64; 3]) -> Self {
        Self {
            u: velocity[0] / spacing[0],
            v: velocity[1] / spacing[1],
            w: velocity[2] / spacing[2],
        }
    }

    pub fn mean(&self, other: &Self) -> Self {
        Self {
            u: 0.5 * (self.u + other.u),
            v: 0.5 * (self.v + other.v),
            w: 0.5 * (self.w + other.w),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite() && self.w.is_finite()
    }
}

/// Advance `position` with the velocity sampled there.
pub fn predictor_step(position: GridPosition, velocity: IndexVelocity, dt: f64) -> GridPosition {
    position.displaced(velocity, dt)
}

/// Re-advance from the original `position` using the mean of the velocities
/// at the position and at the predicted position.
pub fn corrector_step(
    position: GridPosition,
    velocity_at_position: IndexVelocity,
    velocity_at_prediction: IndexVelocity,
    dt: f64,
) -> GridPosition {
    position.displaced(velocity_at_position.mean(&velocity_at_prediction), dt)
}

/// Tracker for one agent's grid position. The engine builds one per step
/// from the committed position, so nothing but the position is carried.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleTracker {
    position: GridPosition,
    /// Top vertical index (number of levels, N).
    levels: f64,
}

impl ParticleTracker {
    pub fn new(position: GridPosition, levels: f64) -> Self {
        Self { position, levels }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    /// Pin the particle to the bottom level without moving it horizontally.
    pub fn attach_to_bottom(&mut self) -> GridPosition {
        self.position.k = 0.0;
        self.position
    }

    /// Run one predictor-corrector step. `sample` returns the advecting
    /// velocity at a position; it is called once at the current position and
    /// once at the predicted one. The position only changes when the whole
    /// step succeeds.
    pub fn advance<F>(&mut self, dt: f64, mut sample: F) -> NumericResult<GridPosition>
    where
        F: FnMut(&GridPosition) -> NumericResult<IndexVelocity>,
    {
        let start = self.position;
        let v_n = checked_velocity(sample(&start)?, &start)?;
        let predicted = predictor_step(start, v_n, dt);
        if !predicted.is_finite() {
            return Err(NumericError::transform(
                "predictor step",
                &start.as_array(),
            ));
        }

        let v_np1 = checked_velocity(sample(&predicted)?, &predicted)?;
        let mut corrected = corrector_step(start, v_n, v_np1, dt);
        if !corrected.is_finite() {
            return Err(NumericError::transform(
                "corrector step",
                &start.as_array(),
            ));
        }
        corrected.k = corrected.k.clamp(0.0, self.levels.max(0.0));

        self.position = corrected;
        Ok(corrected)
    }
}

fn checked_velocity(v: IndexVelocity, at: &GridPosition) -> NumericResult<IndexVelocity> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(NumericError::transform("velocity sample", &at.as_array()))
    }
}
