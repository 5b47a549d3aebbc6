//! # Geographic Utilities
//!
//! Core geographic computation utilities for GPS track analysis.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two track points |
//! | [`polyline_length`] | Total length of a track in meters |
//! | [`bearing`] | Initial great-circle bearing between two points |
//! | [`angle_between`] | Smallest absolute difference between two bearings |
//! | [`slope_percent`] | Signed percent grade from elevation and horizontal distance |
//! | [`interpolate`] | Linear interpolation between two track points |
//! | [`compute_bounds`] | Bounding box of a track |
//!
//! ## Example
//!
//! ```rust
//! use route_risk::{TrackPoint, geo_utils};
//!
//! let a = TrackPoint::new(51.5074, -0.1278);
//! let b = TrackPoint::new(51.5084, -0.1278);
//!
//! // Due north
//! assert!(geo_utils::bearing(&a, &b) < 1.0);
//! println!("{:.0}m", geo_utils::haversine_distance(&a, &b));
//! ```
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees). Interpolation is
//! linear in degrees, which is accurate at segment scale (meters to a few hundred meters).

use crate::{Bounds, TrackPoint};
use geo::{Bearing, Distance, Haversine, Point};

// =============================================================================
// Distance and Direction
// =============================================================================

#[inline]
fn to_point(p: &TrackPoint) -> Point<f64> {
    Point::new(p.longitude, p.latitude)
}

/// Great-circle distance between two points in meters (spherical Earth, r = 6,371 km).
///
/// # Example
///
/// ```rust
/// use route_risk::{TrackPoint, geo_utils};
///
/// let london = TrackPoint::new(51.5074, -0.1278);
/// let paris = TrackPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    Haversine::distance(to_point(p1), to_point(p2))
}

/// Total length of a polyline in meters. Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[TrackPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Initial bearing from `from` to `to` in degrees, normalized to `[0, 360)`.
#[inline]
pub fn bearing(from: &TrackPoint, to: &TrackPoint) -> f64 {
    Haversine::bearing(to_point(from), to_point(to)).rem_euclid(360.0)
}

/// Smallest absolute difference between two bearings, in `[0, 180]`.
#[inline]
pub fn angle_between(b1: f64, b2: f64) -> f64 {
    let diff = (b1 - b2).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Turn angle at `via` when travelling `prev -> via -> next`.
#[inline]
pub fn turn_angle(prev: &TrackPoint, via: &TrackPoint, next: &TrackPoint) -> f64 {
    angle_between(bearing(prev, via), bearing(via, next))
}

/// Signed percent grade, rounded to one decimal.
///
/// Returns 0.0 for (near) zero horizontal distance.
pub fn slope_percent(elevation_delta_m: f64, horizontal_m: f64) -> f64 {
    if horizontal_m <= 1e-6 {
        return 0.0;
    }
    (elevation_delta_m / horizontal_m * 1000.0).round() / 10.0
}

/// Linear interpolation between two track points.
///
/// Elevation is only interpolated when both ends carry one.
pub fn interpolate(a: &TrackPoint, b: &TrackPoint, ratio: f64) -> TrackPoint {
    let ratio = ratio.clamp(0.0, 1.0);
    let elevation = match (a.elevation, b.elevation) {
        (Some(ea), Some(eb)) => Some(ea + ratio * (eb - ea)),
        _ => None,
    };
    TrackPoint {
        latitude: a.latitude + ratio * (b.latitude - a.latitude),
        longitude: a.longitude + ratio * (b.longitude - a.longitude),
        elevation,
    }
}

// =============================================================================
// Bounding Box
// =============================================================================

/// Compute the bounding box of a track. Returns `None` for empty input.
pub fn compute_bounds(points: &[TrackPoint]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Some(Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = TrackPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        let london = TrackPoint::new(51.5074, -0.1278);
        let paris = TrackPoint::new(48.8566, 2.3522);
        assert!(approx_eq(haversine_distance(&london, &paris), 343_560.0, 5000.0));
    }

    #[test]
    fn test_polyline_length_degenerate() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[TrackPoint::new(51.5, -0.1)]), 0.0);
    }

    #[test]
    fn test_polyline_length_sums_edges() {
        let track = vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.001, 0.0),
            TrackPoint::new(0.002, 0.0),
        ];
        // ~111m per 0.001 degree of latitude
        assert!(approx_eq(polyline_length(&track), 222.4, 1.0));
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = TrackPoint::new(0.0, 0.0);
        assert!(approx_eq(bearing(&origin, &TrackPoint::new(0.001, 0.0)), 0.0, 0.01));
        assert!(approx_eq(bearing(&origin, &TrackPoint::new(0.0, 0.001)), 90.0, 0.01));
        assert!(approx_eq(bearing(&origin, &TrackPoint::new(-0.001, 0.0)), 180.0, 0.01));
        assert!(approx_eq(bearing(&origin, &TrackPoint::new(0.0, -0.001)), 270.0, 0.01));
    }

    #[test]
    fn test_angle_between_wraps() {
        assert!(approx_eq(angle_between(350.0, 10.0), 20.0, 1e-9));
        assert!(approx_eq(angle_between(10.0, 350.0), 20.0, 1e-9));
        assert!(approx_eq(angle_between(0.0, 180.0), 180.0, 1e-9));
        assert!(approx_eq(angle_between(90.0, 90.0), 0.0, 1e-9));
    }

    #[test]
    fn test_turn_angle_right_angle() {
        let a = TrackPoint::new(0.0, 0.0);
        let b = TrackPoint::new(0.001, 0.0);
        let c = TrackPoint::new(0.001, 0.001);
        assert!(approx_eq(turn_angle(&a, &b, &c), 90.0, 0.1));
    }

    #[test]
    fn test_slope_percent() {
        assert_eq!(slope_percent(5.0, 100.0), 5.0);
        assert_eq!(slope_percent(-0.26, 5.0), -5.2);
        assert_eq!(slope_percent(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_interpolate_elevation_requires_both_ends() {
        let a = TrackPoint::with_elevation(0.0, 0.0, 100.0);
        let b = TrackPoint::with_elevation(0.002, 0.0, 110.0);
        let mid = interpolate(&a, &b, 0.5);
        assert!(approx_eq(mid.latitude, 0.001, 1e-12));
        assert_eq!(mid.elevation, Some(105.0));

        let c = TrackPoint::new(0.002, 0.0);
        assert_eq!(interpolate(&a, &c, 0.5).elevation, None);
    }

    #[test]
    fn test_compute_bounds() {
        let track = vec![
            TrackPoint::new(51.50, -0.13),
            TrackPoint::new(51.51, -0.12),
            TrackPoint::new(51.505, -0.125),
        ];
        let bounds = compute_bounds(&track).unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
        assert!(compute_bounds(&[]).is_none());
    }
}
