//! Agent state and id allocation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use drifter_logic::constants::{horiz_types, vert_types};
use drifter_logic::tracker::GridPosition;
use drifter_logic::transition::{Abundance, LifecycleState};
use serde::{Deserialize, Serialize};

/// One visited geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lon: f64,
    pub lat: f64,
    /// Metres below the surface.
    pub depth: f64,
}

impl TrackPoint {
    pub fn new(lon: f64, lat: f64, depth: f64) -> Self {
        Self { lon, lat, depth }
    }
}

/// The full state of one simulated individual or super-individual.
///
/// Times are seconds, ages days, `size` mm, `weight` g, depths metres
/// below the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Life-stage type name; selects the stage parameters.
    pub type_name: String,

    // Identity
    pub id: u64,
    pub parent_id: u64,
    pub orig_id: u64,

    // Time
    pub start_time: f64,
    pub time: f64,
    pub age: f64,
    pub age_in_stage: f64,

    // Position
    pub horiz_type: u8,
    pub vert_type: u8,
    pub horiz_pos1: f64,
    pub horiz_pos2: f64,
    pub vert_pos: f64,
    pub grid_cell_id: String,
    /// Continuous grid position, set once the position is initialized.
    pub grid_position: Option<GridPosition>,
    pub track: Vec<TrackPoint>,

    // Lifecycle
    pub active: bool,
    pub alive: bool,
    pub attached: bool,
    pub lifecycle: LifecycleState,

    // Abundance
    pub number: f64,
    pub num_trans: f64,

    // Biology and environment
    pub size: f64,
    pub weight: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub bathymetry: f64,
    pub covariates: BTreeMap<String, f64>,
    /// Attributes particular to the current stage (`maternalAge`, ...).
    pub stage_attributes: BTreeMap<String, f64>,
}

impl AgentState {
    /// A fresh, living release of `number` individuals at a geographic
    /// position and depth below the surface.
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        Self {
            type_name: type_name.into(),
            id,
            parent_id: id,
            orig_id: id,
            start_time: 0.0,
            time: 0.0,
            age: 0.0,
            age_in_stage: 0.0,
            horiz_type: horiz_types::GEOGRAPHIC,
            vert_type: vert_types::DEPTH_BELOW_SURFACE,
            horiz_pos1: 0.0,
            horiz_pos2: 0.0,
            vert_pos: 0.0,
            grid_cell_id: String::new(),
            grid_position: None,
            track: Vec::new(),
            active: true,
            alive: true,
            attached: false,
            lifecycle: LifecycleState::Active,
            number: 1.0,
            num_trans: 0.0,
            size: 0.0,
            weight: 0.0,
            temperature: 0.0,
            salinity: 0.0,
            bathymetry: 0.0,
            covariates: BTreeMap::new(),
            stage_attributes: BTreeMap::new(),
        }
    }

    pub fn at(mut self, lon: f64, lat: f64, depth: f64) -> Self {
        self.horiz_type = horiz_types::GEOGRAPHIC;
        self.vert_type = vert_types::DEPTH_BELOW_SURFACE;
        self.horiz_pos1 = lon;
        self.horiz_pos2 = lat;
        self.vert_pos = depth;
        self
    }

    pub fn abundance(&self) -> Abundance {
        Abundance {
            number: self.number,
            num_trans: self.num_trans,
        }
    }

    pub fn set_abundance(&mut self, abundance: Abundance) {
        self.number = abundance.number;
        self.num_trans = abundance.num_trans;
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.stage_attributes.insert(name.into(), value);
        self
    }

    pub fn last_track_point(&self) -> Option<TrackPoint> {
        self.track.last().copied()
    }

    /// Mark dead and inactive.
    pub fn terminate(&mut self) {
        self.alive = false;
        self.active = false;
        self.lifecycle = LifecycleState::Dead;
    }
}

/// Hands out agent ids. Ids only ever increase, and released agents that
/// bring their own id push the counter past it.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Make sure `id` is never handed out again.
    pub fn observe(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}
