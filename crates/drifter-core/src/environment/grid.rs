//! Uniform lon/lat grid with sigma levels.
//!
//! Level `k` of `N` sits at elevation `z = ssh + (ssh + H)·(k/N − 1)`, so
//! `k = 0` is the bottom and `k = N` the surface. Bathymetry slopes linearly
//! west to east; current, salinity and covariates are uniform; temperature
//! falls off linearly with depth.

use std::collections::BTreeMap;

use drifter_logic::tracker::GridPosition;
use serde::{Deserialize, Serialize};

use super::{fields, EnvironmentField};

/// Mean metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_195.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectilinearField {
    /// Cells along i (east).
    pub nx: usize,
    /// Cells along j (north).
    pub ny: usize,
    /// Vertical levels N.
    pub levels: usize,
    /// Longitude and latitude of grid point (0, 0).
    pub origin: [f64; 2],
    /// Degrees per index step in lon and lat.
    pub spacing_deg: [f64; 2],
    /// Bottom depth at the west and east edges (m).
    pub depth_west: f64,
    pub depth_east: f64,
    pub sea_surface_height: f64,
    /// Uniform current (u, v, w) in m/s.
    pub current: [f64; 3],
    pub surface_temperature: f64,
    /// °C per metre of depth (negative for cooling with depth).
    pub temperature_gradient: f64,
    pub salinity: f64,
    pub covariates: BTreeMap<String, f64>,
}

impl Default for RectilinearField {
    fn default() -> Self {
        Self {
            nx: 50,
            ny: 50,
            levels: 20,
            origin: [-170.0, 54.0],
            spacing_deg: [0.1, 0.05],
            depth_west: 100.0,
            depth_east: 100.0,
            sea_surface_height: 0.0,
            current: [0.0; 3],
            surface_temperature: 8.0,
            temperature_gradient: -0.02,
            salinity: 32.0,
            covariates: BTreeMap::new(),
        }
    }
}

impl RectilinearField {
    fn water_column(&self, ij: [f64; 2]) -> f64 {
        self.bathymetric_depth(ij) + self.sea_surface_height
    }

    fn origin_metres_per_lon_degree(&self) -> f64 {
        METRES_PER_DEGREE * self.origin[1].to_radians().cos()
    }
}

impl EnvironmentField for RectilinearField {
    fn levels(&self) -> f64 {
        self.levels as f64
    }

    fn interpolate(&self, field: &str, pos: &GridPosition) -> f64 {
        match field {
            fields::TEMPERATURE => {
                self.surface_temperature
                    + self.temperature_gradient * self.depth_at_grid_position(pos)
            }
            fields::SALINITY => self.salinity,
            other => self.covariates.get(other).copied().unwrap_or(f64::NAN),
        }
    }

    fn geo_to_grid(&self, lon: f64, lat: f64) -> [f64; 2] {
        [
            (lon - self.origin[0]) / self.spacing_deg[0],
            (lat - self.origin[1]) / self.spacing_deg[1],
        ]
    }

    fn projected_to_grid(&self, x: f64, y: f64) -> [f64; 2] {
        [
            x / (self.spacing_deg[0] * self.origin_metres_per_lon_degree()),
            y / (self.spacing_deg[1] * METRES_PER_DEGREE),
        ]
    }

    fn grid_to_geo(&self, ij: [f64; 2]) -> [f64; 2] {
        [
            self.origin[0] + ij[0] * self.spacing_deg[0],
            self.origin[1] + ij[1] * self.spacing_deg[1],
        ]
    }

    fn bathymetric_depth(&self, ij: [f64; 2]) -> f64 {
        let span = (self.nx.max(2) - 1) as f64;
        let f = (ij[0] / span).clamp(0.0, 1.0);
        self.depth_west + (self.depth_east - self.depth_west) * f
    }

    fn sea_surface_height(&self, _ij: [f64; 2]) -> f64 {
        self.sea_surface_height
    }

    fn vertical_index_from_depth(&self, ij: [f64; 2], depth: f64) -> f64 {
        self.levels() * (1.0 - depth / self.water_column(ij))
    }

    fn depth_at_grid_position(&self, pos: &GridPosition) -> f64 {
        self.water_column(pos.horizontal()) * (1.0 - pos.k / self.levels())
    }

    fn current_velocity(&self, _pos: &GridPosition) -> [f64; 3] {
        self.current
    }

    fn grid_spacing(&self, pos: &GridPosition) -> [f64; 3] {
        let [_, lat] = self.grid_to_geo(pos.horizontal());
        [
            self.spacing_deg[0] * METRES_PER_DEGREE * lat.to_radians().cos(),
            self.spacing_deg[1] * METRES_PER_DEGREE,
            self.water_column(pos.horizontal()) / self.levels(),
        ]
    }

    fn is_near_domain_edge(&self, pos: &GridPosition, tolerance: f64) -> bool {
        let max_i = self.nx.saturating_sub(1) as f64;
        let max_j = self.ny.saturating_sub(1) as f64;
        pos.i < tolerance
            || pos.i > max_i - tolerance
            || pos.j < tolerance
            || pos.j > max_j - tolerance
    }

    fn grid_cell_id(&self, pos: &GridPosition, _tolerance: f64) -> String {
        let i = pos.i.round().clamp(0.0, self.nx.saturating_sub(1) as f64) as i64;
        let j = pos.j.round().clamp(0.0, self.ny.saturating_sub(1) as f64) as i64;
        format!("{}_{}", i, j)
    }
}
