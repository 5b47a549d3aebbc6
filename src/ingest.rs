//! Track ingestion: validation, cleaning, raw coordinate parsing and chunking.
//!
//! GPX/XML parsing happens upstream; this module receives ordered coordinates and makes
//! sure nothing invalid reaches the segmenter.

use crate::config::PipelineConfig;
use crate::error::{Result, RiskError};
use crate::geo_utils::polyline_length;
use crate::TrackPoint;
use log::debug;

/// Minimum number of distinct points a track needs.
pub const MIN_TRACK_POINTS: usize = 2;

/// Validate a track and drop consecutive duplicate positions.
///
/// Fails with [`RiskError::InvalidParameter`] naming the first offending point when a
/// coordinate is out of range or non-finite, or when the track exceeds `max_points`.
/// Fails with [`RiskError::InsufficientData`] when fewer than two distinct points remain.
pub fn clean_track(points: &[TrackPoint], config: &PipelineConfig) -> Result<Vec<TrackPoint>> {
    if points.len() > config.max_points {
        return Err(RiskError::invalid(
            "coordinates",
            format!(
                "{} points exceed the limit of {}",
                points.len(),
                config.max_points
            ),
        ));
    }

    let mut cleaned: Vec<TrackPoint> = Vec::with_capacity(points.len());
    let mut duplicates = 0usize;

    for (i, p) in points.iter().enumerate() {
        if !p.is_valid() {
            return Err(RiskError::invalid(
                format!("coordinates[{}]", i),
                format!(
                    "lat {} / lon {} / elevation {:?} out of range",
                    p.latitude, p.longitude, p.elevation
                ),
            ));
        }
        match cleaned.last() {
            Some(prev) if prev.same_position(p) => duplicates += 1,
            _ => cleaned.push(*p),
        }
    }

    if duplicates > 0 {
        debug!(
            "[Ingest] Dropped {} consecutive duplicate points ({} remain)",
            duplicates,
            cleaned.len()
        );
    }

    if cleaned.len() < MIN_TRACK_POINTS {
        return Err(RiskError::InsufficientData {
            point_count: cleaned.len(),
            minimum_required: MIN_TRACK_POINTS,
        });
    }

    Ok(cleaned)
}

/// Parse raw `[lat, lon]` or `[lat, lon, elevation]` arrays as sent by API clients.
///
/// ```rust
/// use route_risk::parse_coordinates;
///
/// let points = parse_coordinates(&[vec![47.0, 8.0, 410.0], vec![47.001, 8.0]]).unwrap();
/// assert_eq!(points[0].elevation, Some(410.0));
/// assert_eq!(points[1].elevation, None);
/// ```
pub fn parse_coordinates(raw: &[Vec<f64>]) -> Result<Vec<TrackPoint>> {
    raw.iter()
        .enumerate()
        .map(|(i, c)| match c.as_slice() {
            [lat, lon] => Ok(TrackPoint::new(*lat, *lon)),
            [lat, lon, ele] => Ok(TrackPoint::with_elevation(*lat, *lon, *ele)),
            other => Err(RiskError::invalid(
                format!("coordinates[{}]", i),
                format!("expected 2 or 3 values, got {}", other.len()),
            )),
        })
        .collect()
}

/// Total path length in kilometers.
pub fn track_distance_km(points: &[TrackPoint]) -> f64 {
    polyline_length(points) / 1000.0
}

/// Split a track into consecutive upload chunks of at most `chunk_size` points.
pub fn chunk_points(points: &[TrackPoint], chunk_size: usize) -> Result<Vec<Vec<TrackPoint>>> {
    if chunk_size == 0 {
        return Err(RiskError::invalid("chunk_size", "must be at least 1"));
    }
    Ok(points.chunks(chunk_size).map(<[TrackPoint]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(47.0 + i as f64 * 0.0001, 8.0))
            .collect()
    }

    #[test]
    fn test_clean_track_passes_valid_input() {
        let cleaned = clean_track(&line(5), &PipelineConfig::default()).unwrap();
        assert_eq!(cleaned.len(), 5);
    }

    #[test]
    fn test_clean_track_drops_consecutive_duplicates() {
        let mut track = line(3);
        track.insert(1, track[0]);
        track.push(track[3]);
        let cleaned = clean_track(&track, &PipelineConfig::default()).unwrap();
        assert_eq!(cleaned, line(3));
    }

    #[test]
    fn test_clean_track_names_offending_point() {
        let mut track = line(4);
        track[2].latitude = 95.0;
        match clean_track(&track, &PipelineConfig::default()) {
            Err(RiskError::InvalidParameter { field, .. }) => assert_eq!(field, "coordinates[2]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_clean_track_single_point() {
        let result = clean_track(&line(1), &PipelineConfig::default());
        assert!(matches!(
            result,
            Err(RiskError::InsufficientData {
                point_count: 1,
                minimum_required: 2
            })
        ));
    }

    #[test]
    fn test_clean_track_all_duplicates() {
        let p = TrackPoint::new(47.0, 8.0);
        let result = clean_track(&[p, p, p], &PipelineConfig::default());
        assert!(matches!(result, Err(RiskError::InsufficientData { .. })));
    }

    #[test]
    fn test_clean_track_enforces_point_limit() {
        let config = PipelineConfig {
            max_points: 3,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            clean_track(&line(4), &config),
            Err(RiskError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_parse_coordinates_rejects_bad_arity() {
        assert!(parse_coordinates(&[vec![47.0]]).is_err());
        assert!(parse_coordinates(&[vec![47.0, 8.0, 1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_track_distance_km() {
        // 0.001 degree of latitude ~ 111 m
        let d = track_distance_km(&line(11));
        assert!((d - 0.1112).abs() < 0.001);
    }

    #[test]
    fn test_chunk_points() {
        let chunks = chunk_points(&line(5), 2).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 1);
        assert!(chunk_points(&line(5), 0).is_err());
    }
}
