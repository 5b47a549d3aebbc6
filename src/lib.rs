//! # Route Risk
//!
//! GPS route segmentation, injury-risk scoring and medical ("sani") marker placement
//! for cycling events.
//!
//! This library provides:
//! - Fixed-length (~5 m) segmentation of a GPS track with per-segment slope and curvature
//! - An explicit, versioned rule table that scores each segment 1-5 and predicts injuries
//! - Marker selection for race mode (sparse, spaced cluster medians) and tour mode (exhaustive)
//! - Report and map-overlay records for downstream templating and rendering
//!
//! ## Features
//!
//! - **`parallel`** - Score segments in parallel with rayon
//! - **`http`** - Enable the Open-Meteo weather provider
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_risk::{
//!     analyze_route, build_report, FixedWeather, PipelineConfig, RouteRequest, TrackPoint,
//!     WeatherReading,
//! };
//!
//! let track: Vec<TrackPoint> = (0..20)
//!     .map(|i| TrackPoint::with_elevation(47.3769 + i as f64 * 0.00002, 8.5417, 410.0))
//!     .collect();
//!
//! let mut request = RouteRequest::default();
//! request.start_time = Some("2025-05-11T10:00:00Z".to_string());
//! request.weather_override = Some(WeatherReading::new(15.0, 5.0, 0.0, "clear"));
//!
//! let config = PipelineConfig::default();
//! let provider = FixedWeather::new(config.default_weather.clone());
//! let result = analyze_route(&track, &request, &config, &provider).unwrap();
//!
//! let report = build_report(&result);
//! println!("{} segments, mean risk {:.1}", report.segment_count, report.mean_risk);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, RiskError};

// Pipeline configuration (segment length, limits, thresholds)
pub mod config;
pub use config::{PipelineConfig, RiskThresholds, SelectorConfig};

// Geographic utilities (distance, bearing, slope, bounds)
pub mod geo_utils;

// Track validation, raw coordinate parsing and chunking
pub mod ingest;
pub use ingest::{chunk_points, clean_track, parse_coordinates, track_distance_km};

// Fixed-length segmentation
pub mod segmenter;
pub use segmenter::{segmentize, SegmentGeometry};

// Sunrise/sunset for nighttime detection
pub mod solar;

// Weather resolver boundary
pub mod weather;
pub use weather::{
    FixedWeather, WeatherCondition, WeatherProvider, WeatherQuery, WeatherReading,
    WeatherResolver,
};

// HTTP weather provider
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{OpenMeteoConfig, OpenMeteoProvider};

// Street surface classification
pub mod surface;
pub use surface::{StreetSurface, SurfaceAnnotation, SurfaceMap};

// Rider profile
pub mod rider;
pub use rider::{Equipment, FrameMaterial, Gender, RaceType, RiderContext, RiderType};

// Rule-table risk scoring
pub mod risk;
pub use risk::{score_segment, Injury, RiskAssessment, RiskFactor, RiskSignals, RuleTable};

// Sani marker selection
pub mod selector;
pub use selector::{find_clusters, marker_positions, select_sani_markers, Cluster, SelectorState};

// Report aggregation
pub mod report;
pub use report::{build_report, render_report, ReportRenderer, RouteReport, TextReport};

// Map overlay records
pub mod map;
pub use map::{build_overlay, render_map, MapArtifact, MapOverlay, MapRenderer, RiskColor};

// End-to-end orchestration
pub mod pipeline;
pub use pipeline::{analyze_route, analyze_route_with_rules, parse_start_time, RouteRequest};

// ============================================================================
// Core Types
// ============================================================================

/// A track point as produced by GPX/JSON ingestion.
///
/// # Example
/// ```
/// use route_risk::TrackPoint;
/// let point = TrackPoint::with_elevation(47.3769, 8.5417, 408.0); // Zurich
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl TrackPoint {
    /// Create a track point without elevation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    /// Create a track point with elevation in meters.
    pub fn with_elevation(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: Some(elevation),
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
            && self.elevation.map_or(true, f64::is_finite)
    }

    /// True if both points share latitude and longitude.
    pub fn same_position(&self, other: &TrackPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Horizontal position of this point.
    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A plain latitude/longitude pair (segment centers, map markers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Terrain class derived from a segment's signed grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Ascent,
    Descent,
    Flat,
}

impl Terrain {
    /// Classify a signed percent grade; `threshold_pct` bounds the flat band on both sides.
    pub fn from_slope(slope_pct: f64, threshold_pct: f64) -> Self {
        if slope_pct > threshold_pct {
            Terrain::Ascent
        } else if slope_pct < -threshold_pct {
            Terrain::Descent
        } else {
            Terrain::Flat
        }
    }
}

/// Marker density policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Competitive event: one spaced marker per high-risk cluster.
    Race,
    /// Recreational ride: every high-risk segment gets a marker.
    #[default]
    Tour,
}

/// A fully assessed route segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// 0-based position along the route
    pub index: usize,
    /// Path distance at segment start (km)
    pub start_km: f64,
    /// Path distance at segment end (km)
    pub end_km: f64,
    /// Segment length (km)
    pub length_km: f64,
    /// Point at the segment's mid-distance
    pub center: GpsPoint,
    /// Segment polyline, boundary points shared with neighbours
    pub points: Vec<TrackPoint>,
    /// Signed percent grade
    pub slope: f64,
    pub sharp_curve: bool,
    pub terrain: Terrain,
    pub weather: WeatherReading,
    pub nighttime: bool,
    pub street_surface: StreetSurface,
    /// Composite risk, always 1..=5
    pub risk: u8,
    /// Rule-table factors that fired for this segment
    pub risk_factors: Vec<RiskFactor>,
    /// Predicted injuries, most likely first
    pub injuries: Vec<Injury>,
    /// Set only by the marker selector
    pub sani_needed: bool,
}

/// Output of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub segments: Vec<Segment>,
    /// Total path length (km)
    pub distance_km: f64,
    pub mode: RunMode,
    pub start_time: DateTime<Utc>,
    /// Segment length actually used (may be widened for very long tracks)
    pub segment_length_km: f64,
    /// Version of the rule table that scored the segments
    pub rule_table_version: u32,
}

// ============================================================================
// Tests
// ============================================================================
