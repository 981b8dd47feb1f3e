//! Great-circle distance between capitals

/// Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters.
///
/// Identical or degenerate coordinates can push the inner dot product just
/// above 1.0 and make `acos` return NaN; the graph builder normalizes NaN
/// to 0 rather than propagating it.
pub fn earth_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();

    let theta = lon2 - lon1;
    let dist = (lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * theta.cos()).acos();
    dist * EARTH_RADIUS_M
}
