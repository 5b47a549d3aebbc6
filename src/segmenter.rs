//! # Fixed-Length Segmentation
//!
//! Splits a track into consecutive segments of a constant path length (5 m by default).
//!
//! ## Algorithm
//! 1. Accumulate haversine distance along the track
//! 2. Place a boundary at every multiple of the target length, interpolating the
//!    boundary point on the edge that crosses it
//! 3. Each segment keeps its boundary points plus every original vertex in between,
//!    so neighbours share exactly one point and the whole path is covered
//! 4. Turn angles at original vertices are summed into the segment containing the vertex
//! 5. The final segment keeps whatever length remains (it is never dropped or merged)

use crate::config::PipelineConfig;
use crate::error::{Result, RiskError};
use crate::geo_utils::{haversine_distance, interpolate, slope_percent, turn_angle};
use crate::{GpsPoint, TrackPoint};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Remainders shorter than this (meters) are float noise, not a final segment.
const LENGTH_EPSILON_M: f64 = 1e-6;

/// Configuration for segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    /// Target segment length (km)
    pub segment_length_km: f64,
    /// Upper bound on the number of segments; the length is widened to respect it
    pub max_segments: usize,
    /// Cumulative turn (degrees) above which a segment is a sharp curve
    pub sharp_curve_deg: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            segment_length_km: 0.005,
            max_segments: 10_000,
            sharp_curve_deg: 60.0,
        }
    }
}

impl From<&PipelineConfig> for SegmenterConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            segment_length_km: config.segment_length_km,
            max_segments: config.max_segments,
            sharp_curve_deg: config.thresholds.sharp_curve_deg,
        }
    }
}

/// Geometry of one segment, before weather and scoring are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentGeometry {
    pub index: usize,
    pub start_km: f64,
    pub end_km: f64,
    pub length_km: f64,
    /// Interpolated point at mid-distance
    pub center: GpsPoint,
    /// Boundary points plus interior original vertices
    pub points: Vec<TrackPoint>,
    /// Signed percent grade
    pub slope: f64,
    /// Sum of turn angles at vertices inside the segment (degrees)
    pub turn_deg: f64,
    pub sharp_curve: bool,
}

/// Result of segmenting a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub segments: Vec<SegmentGeometry>,
    /// Segment length actually used (km)
    pub segment_length_km: f64,
    /// Total path length (km)
    pub total_km: f64,
}

/// Walks the track once; distances passed to [`EdgeCursor::point_at`] must not decrease.
struct EdgeCursor<'a> {
    points: &'a [TrackPoint],
    cumulative: &'a [f64],
    edge: usize,
}

impl<'a> EdgeCursor<'a> {
    fn point_at(&mut self, distance_m: f64) -> TrackPoint {
        let last_edge = self.points.len() - 2;
        while self.edge < last_edge && self.cumulative[self.edge + 1] < distance_m {
            self.edge += 1;
        }
        let from = self.cumulative[self.edge];
        let span = self.cumulative[self.edge + 1] - from;
        let ratio = if span > 0.0 { (distance_m - from) / span } else { 0.0 };
        interpolate(&self.points[self.edge], &self.points[self.edge + 1], ratio)
    }
}

/// Partition a track into fixed-length segments.
///
/// Fails with [`RiskError::InsufficientData`] when fewer than two distinct points are
/// supplied and with [`RiskError::InvalidParameter`] for out-of-range coordinates.
///
/// # Example
/// ```
/// use route_risk::{segmentize, TrackPoint};
/// use route_risk::segmenter::SegmenterConfig;
///
/// // ~22 m due north
/// let track = vec![TrackPoint::new(47.0, 8.0), TrackPoint::new(47.0002, 8.0)];
/// let result = segmentize(&track, &SegmenterConfig::default()).unwrap();
///
/// assert_eq!(result.segments.len(), 5);
/// assert!(result.segments[4].length_km < 0.005);
/// ```
pub fn segmentize(points: &[TrackPoint], config: &SegmenterConfig) -> Result<Segmentation> {
    if let Some(i) = points.iter().position(|p| !p.is_valid()) {
        return Err(RiskError::invalid(
            format!("coordinates[{}]", i),
            "coordinate out of range",
        ));
    }
    if !(config.segment_length_km.is_finite() && config.segment_length_km > 0.0) {
        return Err(RiskError::invalid(
            "segment_length_km",
            "must be a positive length",
        ));
    }

    let mut track: Vec<TrackPoint> = Vec::with_capacity(points.len());
    for p in points {
        if track.last().map_or(true, |prev| !prev.same_position(p)) {
            track.push(*p);
        }
    }

    let mut cumulative = Vec::with_capacity(track.len());
    let mut acc = 0.0;
    cumulative.push(0.0);
    for w in track.windows(2) {
        acc += haversine_distance(&w[0], &w[1]);
        cumulative.push(acc);
    }
    let total_m = acc;

    if track.len() < 2 || total_m <= LENGTH_EPSILON_M {
        return Err(RiskError::InsufficientData {
            point_count: track.len(),
            minimum_required: 2,
        });
    }

    let mut target_m = config.segment_length_km * 1000.0;
    let mut count = segment_count(total_m, target_m);
    let max_segments = config.max_segments.max(1);
    if count > max_segments {
        target_m = total_m / max_segments as f64;
        count = max_segments;
        warn!(
            "[Segmenter] {:.1} km would need more than {} segments, widening segments to {:.1} m",
            total_m / 1000.0,
            max_segments,
            target_m
        );
    }

    // Turn angles belong to the segment whose span contains the vertex
    let mut turn_sums = vec![0.0; count];
    for i in 1..track.len() - 1 {
        let k = ((cumulative[i] / target_m).floor() as usize).min(count - 1);
        turn_sums[k] += turn_angle(&track[i - 1], &track[i], &track[i + 1]);
    }

    let mut cursor = EdgeCursor {
        points: &track,
        cumulative: &cumulative,
        edge: 0,
    };
    let mut next_vertex = 1;
    let last = track.len() - 1;
    let mut segments = Vec::with_capacity(count);

    for index in 0..count {
        let start_m = index as f64 * target_m;
        let end_m = if index + 1 == count {
            total_m
        } else {
            (index + 1) as f64 * target_m
        };

        let start = if index == 0 {
            track[0]
        } else {
            cursor.point_at(start_m)
        };
        let mid = cursor.point_at((start_m + end_m) / 2.0);

        let mut seg_points = vec![start];
        while next_vertex < last && cumulative[next_vertex] < end_m {
            if cumulative[next_vertex] > start_m {
                seg_points.push(track[next_vertex]);
            }
            next_vertex += 1;
        }

        let end = if index + 1 == count {
            track[last]
        } else {
            cursor.point_at(end_m)
        };
        seg_points.push(end);

        let length_m = end_m - start_m;
        let slope = match (start.elevation, end.elevation) {
            (Some(e0), Some(e1)) => slope_percent(e1 - e0, length_m),
            _ => 0.0,
        };
        let turn_deg = turn_sums[index];

        segments.push(SegmentGeometry {
            index,
            start_km: start_m / 1000.0,
            end_km: end_m / 1000.0,
            length_km: length_m / 1000.0,
            center: mid.position(),
            points: seg_points,
            slope,
            turn_deg,
            sharp_curve: turn_deg > config.sharp_curve_deg,
        });
    }

    debug!(
        "[Segmenter] {} points, {:.3} km -> {} segments of {:.1} m",
        track.len(),
        total_m / 1000.0,
        segments.len(),
        target_m
    );

    Ok(Segmentation {
        segments,
        segment_length_km: target_m / 1000.0,
        total_km: total_m / 1000.0,
    })
}

fn segment_count(total_m: f64, target_m: f64) -> usize {
    (((total_m - LENGTH_EPSILON_M) / target_m).ceil() as usize).max(1)
}

// =============================================================================
// Unit Tests
// =============================================================================
