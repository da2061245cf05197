use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, per the Haversine convention.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Point {
        Point { lat, lon }
    }
}

/// Great-circle distance between two points in meters (Haversine formula).
pub fn distance_meters(a: Point, b: Point) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Whether `point` lies within `radius_m` meters of `target`.
/// A player with no recorded coordinates is never within radius.
pub fn is_within_radius(point: Option<&Point>, target: &Point, radius_m: f64) -> bool {
    match point {
        Some(p) => distance_meters(*p, *target) <= radius_m,
        None => false,
    }
}
