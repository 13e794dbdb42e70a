//! Distance and points.
//!
//! Points decay linearly with distance: a guess within one mile of the
//! target earns the full 1000, after that each further mile (rounded)
//! costs one point, down to zero.

use pinpoint_protocol::Coordinates;
use rand::Rng;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub const METERS_PER_MILE: f64 = 1609.34;

/// Points for a perfect guess.
pub const MAX_POINTS: u32 = 1000;

/// Guesses this close (in miles) score `MAX_POINTS`.
pub const GRACE_MILES: f64 = 1.0;

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Points for a guess `meters` away from the target.
///
/// Non-increasing in distance and always within `0..=MAX_POINTS`.
pub fn score_from_distance(meters: f64) -> u32 {
    let miles = meters / METERS_PER_MILE;
    if miles <= GRACE_MILES {
        return MAX_POINTS;
    }
    if !miles.is_finite() {
        return 0;
    }
    let lost = miles.round();
    if lost >= f64::from(MAX_POINTS) {
        0
    } else {
        MAX_POINTS - lost as u32
    }
}

/// A uniformly random location, avoiding the polar caps where there is
/// nothing to look at.
pub fn random_location(rng: &mut impl Rng) -> Coordinates {
    Coordinates::new(
        rng.random_range(-85.0..=85.0),
        rng.random_range(-180.0..180.0),
    )
}
