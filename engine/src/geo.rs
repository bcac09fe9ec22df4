//! Axis-scaled planar distance approximation.
//!
//! Longitude degrees are scaled by `cos(latitude)` and both axes are treated
//! as flat. Adequate at the few-kilometre scale the engine works at and away
//! from the poles; it is not a geodesic distance.
//!
//! The longitude scale is floored at [`MIN_LON_SCALE`] (reached around
//! 87.1 degrees of latitude). Poleward of that, east-west distances are
//! overstated and territories come out narrower than their true reach, but
//! the number of grid columns a point can touch stays finite.

use claimmap_shared::Position;

pub const KM_PER_DEGREE_LAT: f64 = 111.32;

/// Smallest `cos(latitude)` used when scaling longitude.
pub const MIN_LON_SCALE: f64 = 0.05;

/// Kilometres spanned by one degree of longitude at `lat`.
pub fn km_per_degree_lon(lat: f64) -> f64 {
    KM_PER_DEGREE_LAT * lat.to_radians().cos().max(MIN_LON_SCALE)
}

/// Planar distance between two `[lon, lat]` positions, scaling longitude at
/// their mean latitude.
pub fn planar_distance_km(a: Position, b: Position) -> f64 {
    let mean_lat = (a[1] + b[1]) / 2.0;
    let dx = (b[0] - a[0]) * km_per_degree_lon(mean_lat);
    let dy = (b[1] - a[1]) * KM_PER_DEGREE_LAT;
    dx.hypot(dy)
}
