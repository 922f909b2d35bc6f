//! Solar position for day/night gating of active metabolism.
//!
//! Simulation time 0 is 1 January 00:00 UTC of the reference year.

use crate::constants::{DAY_SECS, NIGHT_ZENITH_DEG};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> f64 {
    if is_leap_year(year) {
        366.0
    } else {
        365.0
    }
}

/// Fractional day of year (1.0 = 1 Jan 00:00 UTC), wrapping into the
/// reference year.
pub fn day_of_year(time_secs: f64, reference_year: i32) -> f64 {
    1.0 + (time_secs / DAY_SECS).rem_euclid(days_in_year(reference_year))
}

/// Week of the year, 1 for the first seven days.
pub fn week_of_year(time_secs: f64, reference_year: i32) -> f64 {
    ((day_of_year(time_secs, reference_year) - 1.0) / 7.0).floor() + 1.0
}

/// Solar declination in degrees.
pub fn declination_deg(day_of_year: f64) -> f64 {
    23.44 * (2.0 * std::f64::consts::PI * (284.0 + day_of_year.floor()) / 365.0).sin()
}

/// Solar zenith angle in degrees at (`lon`, `lat`) for a fractional day of year.
pub fn solar_zenith_deg(lon: f64, lat: f64, day_of_year: f64) -> f64 {
    let utc_hours = day_of_year.fract() * 24.0;
    let solar_hours = utc_hours + lon / 15.0;
    let hour_angle = (15.0 * (solar_hours - 12.0)).to_radians();
    let decl = declination_deg(day_of_year).to_radians();
    let phi = lat.to_radians();
    let cos_z = phi.sin() * decl.sin() + phi.cos() * decl.cos() * hour_angle.cos();
    cos_z.clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn is_daytime(lon: f64, lat: f64, day_of_year: f64) -> bool {
    solar_zenith_deg(lon, lat, day_of_year) <= NIGHT_ZENITH_DEG
}
