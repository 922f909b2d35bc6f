//! Model constants: time conversions, transition look-ahead, position type codes.
//!
//! Position types are plain `u8` codes so they survive a trip through a
//! delimited attribute row unchanged.

/// Seconds per day.
pub const DAY_SECS: f64 = 86_400.0;

/// Fraction of a timestep (converted to days) added to the age in stage
/// when testing transition eligibility.
pub const TRANSITION_LOOKAHEAD: f64 = 0.25;

/// Solar zenith angle (degrees) beyond which it is night. Includes the
/// standard allowance for refraction and the solar disc radius.
pub const NIGHT_ZENITH_DEG: f64 = 90.833;

/// Micrograms per gram. Weight is carried in grams; consumption growth
/// runs in micrograms.
pub const MICROGRAMS_PER_GRAM: f64 = 1.0e6;

pub mod horiz_types {
    /// Projected coordinates (x, y) in metres.
    pub const PROJECTED: u8 = 0;
    /// Geographic coordinates (lon, lat) in degrees.
    pub const GEOGRAPHIC: u8 = 1;

    pub fn is_valid(code: u8) -> bool {
        code <= GEOGRAPHIC
    }
}

pub mod vert_types {
    /// Vertical grid index K (0 = bottom, N = surface).
    pub const GRID_LEVEL: u8 = 0;
    /// Elevation z in metres, negative below the surface.
    pub const ELEVATION: u8 = 1;
    /// Depth below the surface in metres, positive down.
    pub const DEPTH_BELOW_SURFACE: u8 = 2;
    /// Height above the bottom in metres.
    pub const HEIGHT_ABOVE_BOTTOM: u8 = 3;

    pub fn is_valid(code: u8) -> bool {
        code <= HEIGHT_ABOVE_BOTTOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_codes() {
        assert!(horiz_types::is_valid(horiz_types::GEOGRAPHIC));
        assert!(!horiz_types::is_valid(2));
        assert!(vert_types::is_valid(vert_types::HEIGHT_ABOVE_BOTTOM));
        assert!(!vert_types::is_valid(4));
    }

    #[test]
    fn test_lookahead_is_quarter_step() {
        let one_day = DAY_SECS;
        assert!((TRANSITION_LOOKAHEAD * one_day / DAY_SECS - 0.25).abs() < 1e-12);
    }
}
