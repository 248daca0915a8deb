//! # Spherical Geometry
//!
//! Points are `[lng, lat]` in degrees, matching GeoJSON coordinate order.

use serde_json::Value;

/// Earth radius in miles, used to turn a distance into a sphere radius
pub const EARTH_RADIUS_MI: f64 = 3963.2;

/// Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Earth radius in metres, the unit distances are reported in
pub const EARTH_RADIUS_M: f64 = EARTH_RADIUS_KM * 1000.0;

/// Extract `[lng, lat]` from a GeoJSON point or a bare coordinate pair
pub fn point_of(value: &Value) -> Option<[f64; 2]> {
    let coords = match value {
        Value::Object(map) => map.get("coordinates")?,
        other => other,
    };
    let pair = coords.as_array()?;
    Some([pair.first()?.as_f64()?, pair.get(1)?.as_f64()?])
}

/// Great-circle angle between two points, in radians (haversine)
pub fn central_angle(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lng1, lat1) = (a[0].to_radians(), a[1].to_radians());
    let (lng2, lat2) = (b[0].to_radians(), b[1].to_radians());

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    2.0 * h.sqrt().min(1.0).asin()
}

/// Distance in metres between two points
pub fn distance_meters(a: [f64; 2], b: [f64; 2]) -> f64 {
    central_angle(a, b) * EARTH_RADIUS_M
}
