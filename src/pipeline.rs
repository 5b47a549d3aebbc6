//! # Route Analysis Pipeline
//!
//! Track points → segments → weather → per-segment scoring → marker selection.
//!
//! Scoring has no cross-segment state, so with the `parallel` feature it runs on rayon.
//! Marker selection always runs afterwards, sequentially, over the whole sequence.

use crate::config::PipelineConfig;
use crate::error::{OptionExt, Result, RiskError};
use crate::ingest::clean_track;
use crate::rider::RiderContext;
use crate::risk::{score_segment, RuleTable};
use crate::segmenter::{segmentize, SegmentGeometry, SegmenterConfig};
use crate::selector::select_sani_markers;
use crate::solar::is_nighttime;
use crate::surface::{SurfaceMap, StreetSurface};
use crate::weather::{WeatherProvider, WeatherReading, WeatherResolver};
use crate::{RunMode, RunResult, Segment, TrackPoint};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Per-request inputs besides the track itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteRequest {
    pub rider: RiderContext,
    /// ISO-8601 start time; falls back to the configured default
    pub start_time: Option<String>,
    /// Applied to every segment; no provider calls are made when set
    pub weather_override: Option<WeatherReading>,
    /// Forces a marker policy; otherwise derived from the rider's race type
    pub mode: Option<RunMode>,
    #[serde(skip)]
    pub surfaces: SurfaceMap,
}

impl RouteRequest {
    /// The marker policy for this request.
    pub fn run_mode(&self) -> RunMode {
        self.mode
            .unwrap_or_else(|| RunMode::for_race_type(self.rider.race_type))
    }
}

/// Parse an ISO-8601 timestamp. Strings without an offset are taken as UTC.
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RiskError::invalid(
        "start_time",
        format!("'{}' is not an ISO-8601 timestamp", raw),
    ))
}

fn resolve_start_time(request: &RouteRequest, config: &PipelineConfig) -> Result<DateTime<Utc>> {
    match &request.start_time {
        Some(raw) => parse_start_time(raw),
        None => config
            .default_start_time
            .ok_or_invalid("start_time", "a start time is required"),
    }
}

/// When each segment's mid-point is reached at the configured average speed.
///
/// Fails with [`RiskError::InvalidParameter`] when a timestamp leaves chrono's range.
fn segment_timestamps(
    segments: &[SegmentGeometry],
    start: DateTime<Utc>,
    average_speed_kmh: f64,
) -> Result<Vec<DateTime<Utc>>> {
    segments
        .iter()
        .map(|s| {
            let mid_km = (s.start_km + s.end_km) / 2.0;
            let millis = (mid_km / average_speed_kmh * 3_600_000.0).round();
            Some(millis)
                .filter(|ms| ms.is_finite() && ms.abs() < i64::MAX as f64)
                .and_then(|ms| Duration::try_milliseconds(ms as i64))
                .and_then(|offset| start.checked_add_signed(offset))
                .ok_or_invalid(
                    "average_speed_kmh",
                    "segment timestamps overflow the supported date range",
                )
        })
        .collect()
}

/// Everything a single segment's scoring reads.
struct ScoringContext<'a> {
    rider: &'a RiderContext,
    table: &'a RuleTable,
    config: &'a PipelineConfig,
    surfaces: &'a SurfaceMap,
}

impl ScoringContext<'_> {
    fn score(
        &self,
        geometry: &SegmentGeometry,
        weather: &WeatherReading,
        timestamp: DateTime<Utc>,
    ) -> Segment {
        let nighttime = is_nighttime(timestamp, geometry.center.latitude, geometry.center.longitude);
        let surface: StreetSurface = self.surfaces.surface_at(&geometry.center);
        let scored = score_segment(
            geometry,
            weather,
            nighttime,
            surface,
            self.rider,
            self.table,
            self.config,
        );

        Segment {
            index: geometry.index,
            start_km: geometry.start_km,
            end_km: geometry.end_km,
            length_km: geometry.length_km,
            center: geometry.center,
            points: geometry.points.clone(),
            slope: geometry.slope,
            sharp_curve: geometry.sharp_curve,
            terrain: scored.terrain,
            weather: weather.clone(),
            nighttime,
            street_surface: scored.street_surface,
            risk: scored.assessment.risk,
            risk_factors: scored.assessment.factors,
            injuries: scored.assessment.injuries,
            sani_needed: false,
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn score_segments(
    ctx: &ScoringContext<'_>,
    geometry: &[SegmentGeometry],
    weather: &[WeatherReading],
    timestamps: &[DateTime<Utc>],
) -> Vec<Segment> {
    geometry
        .iter()
        .zip(weather)
        .zip(timestamps)
        .map(|((g, w), t)| ctx.score(g, w, *t))
        .collect()
}

#[cfg(feature = "parallel")]
fn score_segments_parallel(
    ctx: &ScoringContext<'_>,
    geometry: &[SegmentGeometry],
    weather: &[WeatherReading],
    timestamps: &[DateTime<Utc>],
) -> Vec<Segment> {
    use rayon::prelude::*;

    geometry
        .par_iter()
        .zip(weather.par_iter())
        .zip(timestamps.par_iter())
        .map(|((g, w), t)| ctx.score(g, w, *t))
        .collect()
}

/// Analyze a route with the built-in rule table.
///
/// # Example
/// ```
/// use route_risk::{analyze_route, FixedWeather, PipelineConfig, RouteRequest, TrackPoint};
///
/// let track = vec![TrackPoint::new(47.0, 8.0), TrackPoint::new(47.0002, 8.0)];
/// let config = PipelineConfig::default();
/// let provider = FixedWeather::new(config.default_weather.clone());
///
/// let result = analyze_route(&track, &RouteRequest::default(), &config, &provider).unwrap();
/// assert_eq!(result.segments.len(), 5);
/// assert!(result.segments.iter().all(|s| (1..=5).contains(&s.risk)));
/// ```
pub fn analyze_route(
    points: &[TrackPoint],
    request: &RouteRequest,
    config: &PipelineConfig,
    provider: &dyn WeatherProvider,
) -> Result<RunResult> {
    analyze_route_with_rules(points, request, config, provider, &RuleTable::default())
}

/// Analyze a route with a caller-supplied rule table.
pub fn analyze_route_with_rules(
    points: &[TrackPoint],
    request: &RouteRequest,
    config: &PipelineConfig,
    provider: &dyn WeatherProvider,
    table: &RuleTable,
) -> Result<RunResult> {
    let started = std::time::Instant::now();

    config.validate()?;
    table.validate()?;
    request.rider.validate()?;
    let start_time = resolve_start_time(request, config)?;
    let mode = request.run_mode();

    let track = clean_track(points, config)?;
    let segmentation = segmentize(&track, &SegmenterConfig::from(config))?;
    let geometry = &segmentation.segments;

    info!(
        "[Pipeline] {} points → {} segments over {:.3} km ({:?} mode)",
        track.len(),
        geometry.len(),
        segmentation.total_km,
        mode
    );

    let timestamps = segment_timestamps(geometry, start_time, config.average_speed_kmh)?;
    let resolver = WeatherResolver::new(provider, config.weather_band_km, config.default_weather.clone());
    let weather = resolver.resolve_segments(geometry, &timestamps, request.weather_override.as_ref());

    let ctx = ScoringContext {
        rider: &request.rider,
        table,
        config,
        surfaces: &request.surfaces,
    };

    #[cfg(feature = "parallel")]
    let mut segments = score_segments_parallel(&ctx, geometry, &weather, &timestamps);

    #[cfg(not(feature = "parallel"))]
    let mut segments = score_segments(&ctx, geometry, &weather, &timestamps);

    let markers = select_sani_markers(&mut segments, mode, &config.selector);

    debug!(
        "[Pipeline] Scored {} segments, {} markers in {:?}",
        segments.len(),
        markers,
        started.elapsed()
    );

    Ok(RunResult {
        segments,
        distance_km: segmentation.total_km,
        mode,
        start_time,
        segment_length_km: segmentation.segment_length_km,
        rule_table_version: table.version,
    })
}
