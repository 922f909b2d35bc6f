//! Environment field: the read-only ocean the agents drift through.
//!
//! The engine only talks to [`EnvironmentField`]; [`RectilinearField`] is a
//! reference implementation on a uniform lon/lat grid with sigma levels,
//! used by the harness, tests and benches.

mod grid;

pub use grid::*;

use drifter_logic::error::{finite, NumericResult};
use drifter_logic::tracker::GridPosition;

/// Interpolated field names every implementation must serve.
pub mod fields {
    pub const TEMPERATURE: &str = "temperature";
    pub const SALINITY: &str = "salinity";
}

/// Read-only access to the circulation model for one time slice. Shared by
/// all workers during a step, so it must be `Send + Sync`.
///
/// Grid positions are continuous indices; `k` runs from 0 at the bottom to
/// [`levels`](Self::levels) at the surface. Depths are metres below the
/// surface, positive down.
pub trait EnvironmentField: Send + Sync {
    /// Number of vertical levels N (the surface index).
    fn levels(&self) -> f64;

    /// Value of a named scalar field at `pos`. Unknown names give NaN.
    fn interpolate(&self, field: &str, pos: &GridPosition) -> f64;

    fn geo_to_grid(&self, lon: f64, lat: f64) -> [f64; 2];

    fn projected_to_grid(&self, x: f64, y: f64) -> [f64; 2];

    /// Inverse of [`geo_to_grid`](Self::geo_to_grid): `[lon, lat]`.
    fn grid_to_geo(&self, ij: [f64; 2]) -> [f64; 2];

    /// Bottom depth below mean sea level (m, positive).
    fn bathymetric_depth(&self, ij: [f64; 2]) -> f64;

    fn sea_surface_height(&self, ij: [f64; 2]) -> f64;

    /// Vertical index for a depth below the surface.
    fn vertical_index_from_depth(&self, ij: [f64; 2], depth: f64) -> f64;

    /// Depth below the surface of a grid position.
    fn depth_at_grid_position(&self, pos: &GridPosition) -> f64;

    /// Current (u east, v north, w up) in m/s.
    fn current_velocity(&self, pos: &GridPosition) -> [f64; 3];

    /// Metres per index unit along i, j and k.
    fn grid_spacing(&self, pos: &GridPosition) -> [f64; 3];

    fn is_near_domain_edge(&self, pos: &GridPosition, tolerance: f64) -> bool;

    fn grid_cell_id(&self, pos: &GridPosition, tolerance: f64) -> String;
}

/// Environment values at one position.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSample {
    pub lon: f64,
    pub lat: f64,
    pub depth: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub bathymetry: f64,
    pub covariates: Vec<(String, f64)>,
}

impl EnvironmentSample {
    /// Sample every standard field plus `covariates` at `pos`, rejecting
    /// any non-finite value.
    pub fn take(
        env: &dyn EnvironmentField,
        pos: &GridPosition,
        covariates: &[String],
    ) -> NumericResult<Self> {
        let at = pos.as_array();
        let [lon, lat] = env.grid_to_geo(pos.horizontal());
        let covariates = covariates
            .iter()
            .map(|name| {
                let v = env.interpolate(name, pos);
                finite(v, name, &at).map(|v| (name.clone(), v))
            })
            .collect::<NumericResult<Vec<_>>>()?;
        Ok(Self {
            lon: finite(lon, "grid to geographic", &at)?,
            lat: finite(lat, "grid to geographic", &at)?,
            depth: finite(env.depth_at_grid_position(pos), "depth at grid position", &at)?,
            temperature: finite(env.interpolate(fields::TEMPERATURE, pos), fields::TEMPERATURE, &at)?,
            salinity: finite(env.interpolate(fields::SALINITY, pos), fields::SALINITY, &at)?,
            bathymetry: finite(env.bathymetric_depth(pos.horizontal()), "bathymetry", &at)?,
            covariates,
        })
    }
}
