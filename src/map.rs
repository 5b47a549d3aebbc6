//! Map overlay records.
//!
//! Turns a scored route into colored polylines and marker records. Drawing them is left to a
//! [`MapRenderer`]; [`MapOverlay::to_geojson`] gives renderers a ready-made feature collection.

use crate::error::{Result, RiskError};
use crate::geo_utils::compute_bounds;
use crate::risk::{Injury, RiskFactor};
use crate::{Bounds, GpsPoint, RunResult, Segment, TrackPoint};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Display color for a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskColor {
    Green,
    Orange,
    Red,
}

impl RiskColor {
    /// 1-2 green, 3 orange, 4-5 red.
    pub fn from_risk(risk: u8) -> Self {
        match risk {
            0..=2 => RiskColor::Green,
            3 => RiskColor::Orange,
            _ => RiskColor::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskColor::Green => "green",
            RiskColor::Orange => "orange",
            RiskColor::Red => "red",
        }
    }
}

/// One colored segment polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLine {
    pub segment_index: usize,
    pub risk: u8,
    pub color: RiskColor,
    pub points: Vec<GpsPoint>,
    /// Route conditions behind the score, e.g. "gravel surface", "rain"
    pub reasons: Vec<String>,
    pub popup: String,
}

/// A medical responder position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaniMarker {
    pub segment_index: usize,
    pub location: GpsPoint,
    pub risk: u8,
    pub injuries: Vec<Injury>,
}

/// Everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOverlay {
    pub bounds: Option<Bounds>,
    /// Full route, for the base line
    pub track: Vec<GpsPoint>,
    pub lines: Vec<RiskLine>,
    pub markers: Vec<SaniMarker>,
}

/// Reference to a rendered map (file path, URL, object key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapArtifact {
    pub reference: String,
}

/// Draws an overlay somewhere.
pub trait MapRenderer {
    fn render(&self, overlay: &MapOverlay) -> Result<MapArtifact>;
}

/// Factors describing the route itself. Rider factors are the same on every segment and
/// would only clutter the popups.
fn is_route_condition(factor: RiskFactor) -> bool {
    matches!(
        factor,
        RiskFactor::SteepAscent
            | RiskFactor::SteepDescent
            | RiskFactor::SharpCurve
            | RiskFactor::ColdTemperature
            | RiskFactor::StrongWind
            | RiskFactor::Precipitation
            | RiskFactor::AdverseCondition
            | RiskFactor::Nighttime
    )
}

/// Human-readable reasons for one segment's score.
pub fn popup_reasons(segment: &Segment) -> Vec<String> {
    let mut reasons = Vec::new();
    if segment.street_surface.is_irregular() {
        reasons.push(format!("{} surface", segment.street_surface));
    }
    reasons.extend(
        segment
            .risk_factors
            .iter()
            .filter(|f| is_route_condition(**f))
            .map(|f| f.label().to_string()),
    );
    reasons
}

fn popup_text(segment: &Segment, reasons: &[String]) -> String {
    if reasons.is_empty() {
        format!("Segment {}: risk {}", segment.index, segment.risk)
    } else {
        format!(
            "Segment {}: risk {} ({})",
            segment.index,
            segment.risk,
            reasons.join(", ")
        )
    }
}

fn track_of(segments: &[Segment]) -> Vec<TrackPoint> {
    let mut track: Vec<TrackPoint> = Vec::new();
    for s in segments {
        for p in &s.points {
            if track.last().map_or(true, |last| !last.same_position(p)) {
                track.push(*p);
            }
        }
    }
    track
}

/// Build the overlay for a run.
pub fn build_overlay(result: &RunResult) -> MapOverlay {
    let track = track_of(&result.segments);

    let lines: Vec<RiskLine> = result
        .segments
        .iter()
        .map(|s| {
            let reasons = popup_reasons(s);
            RiskLine {
                segment_index: s.index,
                risk: s.risk,
                color: RiskColor::from_risk(s.risk),
                points: s.points.iter().map(TrackPoint::position).collect(),
                popup: popup_text(s, &reasons),
                reasons,
            }
        })
        .collect();

    let markers: Vec<SaniMarker> = result
        .segments
        .iter()
        .filter(|s| s.sani_needed)
        .map(|s| SaniMarker {
            segment_index: s.index,
            location: s.center,
            risk: s.risk,
            injuries: s.injuries.clone(),
        })
        .collect();

    debug!(
        "[MapOverlay] {} lines, {} markers",
        lines.len(),
        markers.len()
    );

    MapOverlay {
        bounds: compute_bounds(&track),
        track: track.iter().map(TrackPoint::position).collect(),
        lines,
        markers,
    }
}

impl MapOverlay {
    /// GeoJSON `FeatureCollection`: one `LineString` per segment, one `Point` per marker.
    ///
    /// Coordinates are `[lon, lat]` as GeoJSON requires.
    pub fn to_geojson(&self) -> Value {
        let coords = |points: &[GpsPoint]| -> Vec<[f64; 2]> {
            points.iter().map(|p| [p.longitude, p.latitude]).collect()
        };

        let mut features: Vec<Value> = self
            .lines
            .iter()
            .map(|l| {
                json!({
                    "type": "Feature",
                    "geometry": { "type": "LineString", "coordinates": coords(&l.points) },
                    "properties": {
                        "segment": l.segment_index,
                        "risk": l.risk,
                        "color": l.color.as_str(),
                        "popup": l.popup,
                    }
                })
            })
            .collect();

        features.extend(self.markers.iter().map(|m| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [m.location.longitude, m.location.latitude]
                },
                "properties": {
                    "segment": m.segment_index,
                    "risk": m.risk,
                    "marker": "sani",
                    "injuries": m.injuries,
                }
            })
        }));

        json!({ "type": "FeatureCollection", "features": features })
    }
}

/// Run a renderer, reporting any failure as [`RiskError::RenderingFailure`].
pub fn render_map(renderer: &dyn MapRenderer, overlay: &MapOverlay) -> Result<MapArtifact> {
    renderer.render(overlay).map_err(|e| {
        warn!("[MapOverlay] Renderer failed: {}", e);
        match e {
            RiskError::RenderingFailure { .. } => e,
            other => RiskError::RenderingFailure {
                message: other.to_string(),
            },
        }
    })
}
