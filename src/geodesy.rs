//! Spherical-earth geodesy helpers for overlay geometry.
//!
//! These are visual-overlay grade approximations (fixed mean Earth radius,
//! no ellipsoid), not navigation-grade formulas.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per statute mile
pub const METERS_PER_STATUTE_MILE: f64 = 1_609.344;

/// Meters per nautical mile
pub const METERS_PER_NAUTICAL_MILE: f64 = 1_852.0;

/// Sexagesimal bearing of the form `163° 40' 08"` (seconds mark optional)
static BEARING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ^\s*
        (?P<deg>\d+(?:\.\d+)?)\s*°\s*
        (?P<min>\d+(?:\.\d+)?)\s*'\s*
        (?P<sec>\d+(?:\.\d+)?)\s*"?\s*
        $
    "#,
    )
    .unwrap()
});

/// A latitude/longitude pair in decimal degrees. Pure value type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Unit for great-circle distances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    StatuteMiles,
    NauticalMiles,
    Kilometers,
}

/// Parse a sexagesimal bearing string (`D° M' S"`) into decimal degrees.
///
/// Fail-soft by design: a malformed bearing returns `None` so that callers
/// can skip the offending receiver without aborting the rest of the event.
pub fn parse_bearing(text: &str) -> Option<f64> {
    let caps = BEARING_RE.captures(text)?;
    let degrees: f64 = caps.name("deg")?.as_str().parse().ok()?;
    let minutes: f64 = caps.name("min")?.as_str().parse().ok()?;
    let seconds: f64 = caps.name("sec")?.as_str().parse().ok()?;
    Some(degrees + minutes / 60.0 + seconds / 3600.0)
}

/// Project a destination point from `origin` along `bearing_degrees` for
/// `distance_meters`, using the standard spherical great-circle formula.
pub fn destination_point(origin: LatLng, bearing_degrees: f64, distance_meters: f64) -> LatLng {
    let angular = distance_meters / EARTH_RADIUS_M;
    let bearing = bearing_degrees.to_radians();
    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lng2 = lng1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Normalize longitude to [-180, 180)
    let lng2_deg = (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    LatLng::new(lat2.to_degrees(), lng2_deg)
}

/// Great-circle distance between two points via the spherical law of cosines.
///
/// Returns exactly 0 for identical points; the short-circuit also avoids an
/// `acos` domain error when rounding pushes the cosine argument above 1.
/// The argument is clamped to [-1, 1] regardless.
pub fn haversine_distance(a: LatLng, b: LatLng, unit: DistanceUnit) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let cos_arg = (lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lng.cos())
        .clamp(-1.0, 1.0);
    let meters = EARTH_RADIUS_M * cos_arg.acos();

    match unit {
        DistanceUnit::StatuteMiles => meters / METERS_PER_STATUTE_MILE,
        DistanceUnit::NauticalMiles => meters / METERS_PER_NAUTICAL_MILE,
        DistanceUnit::Kilometers => meters / 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearing_exact() {
        let bearing = parse_bearing("163° 40' 08\"").unwrap();
        let expected = 163.0 + 40.0 / 60.0 + 8.0 / 3600.0;
        assert_eq!(bearing, expected);
    }

    #[test]
    fn test_parse_bearing_zero() {
        assert_eq!(parse_bearing("0° 0' 0\"").unwrap(), 0.0);
        assert_eq!(parse_bearing("90° 00' 00\"").unwrap(), 90.0);
    }

    #[test]
    fn test_parse_bearing_missing_seconds_mark() {
        // Trailing seconds mark is optional
        assert!(parse_bearing("12° 30' 15").is_some());
    }

    #[test]
    fn test_parse_bearing_malformed() {
        assert!(parse_bearing("").is_none());
        assert!(parse_bearing("163°").is_none());
        assert!(parse_bearing("163° 40'").is_none());
        assert!(parse_bearing("north by northwest").is_none());
    }

    #[test]
    fn test_destination_point_identity() {
        let origin = LatLng::new(34.0, -118.0);
        let dest = destination_point(origin, 0.0, 0.0);
        assert!((dest.lat - origin.lat).abs() < 1e-9);
        assert!((dest.lng - origin.lng).abs() < 1e-9);
    }

    #[test]
    fn test_destination_point_due_east() {
        let origin = LatLng::new(34.0, -118.0);
        let dest = destination_point(origin, 90.0, 100.0 * METERS_PER_STATUTE_MILE);
        assert!(dest.lng > origin.lng);
        // Latitude barely moves for a 100 mile eastward hop
        assert!((dest.lat - origin.lat).abs() < 0.1);
        // And the round trip distance matches
        let miles = haversine_distance(origin, dest, DistanceUnit::StatuteMiles);
        assert!((miles - 100.0).abs() < 0.1, "got {miles} miles");
    }

    #[test]
    fn test_haversine_zero_for_identical_points() {
        let p = LatLng::new(51.5, -0.12);
        assert_eq!(haversine_distance(p, p, DistanceUnit::StatuteMiles), 0.0);
        assert_eq!(haversine_distance(p, p, DistanceUnit::NauticalMiles), 0.0);
        assert_eq!(haversine_distance(p, p, DistanceUnit::Kilometers), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // LAX to JFK is roughly 3,974 km great-circle
        let lax = LatLng::new(33.9425, -118.408);
        let jfk = LatLng::new(40.6399, -73.7787);
        let km = haversine_distance(lax, jfk, DistanceUnit::Kilometers);
        assert!((km - 3_974.0).abs() < 30.0, "got {km} km");
    }

    #[test]
    fn test_haversine_units_are_consistent() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 1.0);
        let km = haversine_distance(a, b, DistanceUnit::Kilometers);
        let sm = haversine_distance(a, b, DistanceUnit::StatuteMiles);
        let nm = haversine_distance(a, b, DistanceUnit::NauticalMiles);
        assert!((sm * METERS_PER_STATUTE_MILE / 1_000.0 - km).abs() < 1e-9);
        assert!((nm * METERS_PER_NAUTICAL_MILE / 1_000.0 - km).abs() < 1e-9);
    }
}
