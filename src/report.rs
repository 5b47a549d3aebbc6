//! # Route Report
//!
//! Aggregates a scored run into summary statistics and a short narrative. No scoring happens
//! here; the [`RouteReport`] is the input of whatever templating produces the final document.

use crate::error::{Result, RiskError};
use crate::risk::Injury;
use crate::surface::StreetSurface;
use crate::{RunMode, RunResult, Terrain};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How often one injury kind is predicted along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryFrequency {
    pub injury: Injury,
    pub segments: usize,
}

/// Terrain breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSummary {
    pub ascent_segments: usize,
    pub descent_segments: usize,
    pub flat_segments: usize,
    /// Steepest climb, percent grade (0 if none)
    pub max_ascent_pct: f64,
    /// Steepest descent as a negative percent grade (0 if none)
    pub max_descent_pct: f64,
}

/// Weather seen along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub max_wind_speed: f64,
    pub max_precip: f64,
    /// Distinct condition texts in route order
    pub conditions: Vec<String>,
}

/// Report data for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    pub segment_count: usize,
    /// Rounded to 2 decimals
    pub distance_km: f64,
    pub mode: RunMode,
    pub mean_risk: f64,
    pub max_risk: u8,
    /// `risk_histogram[r - 1]` = number of segments with risk `r`
    pub risk_histogram: [usize; 5],
    pub sani_count: usize,
    pub sani_indices: Vec<usize>,
    /// Deduplicated, most frequent first
    pub injuries: Vec<InjuryFrequency>,
    pub terrain: TerrainSummary,
    pub weather: Option<WeatherSummary>,
    pub nighttime_segments: usize,
    pub sharp_curve_segments: usize,
    pub surface_counts: Vec<(StreetSurface, usize)>,
    pub narrative: Vec<String>,
}

/// Turns a report into a document (text, HTML, PDF reference ...).
pub trait ReportRenderer {
    fn render(&self, report: &RouteReport) -> Result<String>;
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Injury kinds ordered by how many segments predict them; ties by first appearance.
fn injury_frequencies(result: &RunResult) -> Vec<InjuryFrequency> {
    let mut counts: HashMap<Injury, (usize, usize)> = HashMap::new();
    let mut seen = 0usize;
    for s in &result.segments {
        for injury in &s.injuries {
            let entry = counts.entry(*injury).or_insert_with(|| {
                seen += 1;
                (0, seen)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(Injury, usize, usize)> =
        counts.into_iter().map(|(i, (n, first))| (i, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .map(|(injury, segments, _)| InjuryFrequency { injury, segments })
        .collect()
}

fn terrain_summary(result: &RunResult) -> TerrainSummary {
    let count = |t: Terrain| result.segments.iter().filter(|s| s.terrain == t).count();
    TerrainSummary {
        ascent_segments: count(Terrain::Ascent),
        descent_segments: count(Terrain::Descent),
        flat_segments: count(Terrain::Flat),
        max_ascent_pct: result.segments.iter().map(|s| s.slope).fold(0.0, f64::max),
        max_descent_pct: result.segments.iter().map(|s| s.slope).fold(0.0, f64::min),
    }
}

fn weather_summary(result: &RunResult) -> Option<WeatherSummary> {
    let first = result.segments.first()?;
    let mut summary = WeatherSummary {
        min_temperature: first.weather.temperature,
        max_temperature: first.weather.temperature,
        max_wind_speed: first.weather.wind_speed,
        max_precip: first.weather.precip,
        conditions: Vec::new(),
    };
    for s in &result.segments {
        let w = &s.weather;
        summary.min_temperature = summary.min_temperature.min(w.temperature);
        summary.max_temperature = summary.max_temperature.max(w.temperature);
        summary.max_wind_speed = summary.max_wind_speed.max(w.wind_speed);
        summary.max_precip = summary.max_precip.max(w.precip);
        if !summary.conditions.contains(&w.condition) {
            summary.conditions.push(w.condition.clone());
        }
    }
    Some(summary)
}

fn surface_counts(result: &RunResult) -> Vec<(StreetSurface, usize)> {
    let mut counts: Vec<(StreetSurface, usize)> = Vec::new();
    for s in &result.segments {
        match counts.iter_mut().find(|(surface, _)| *surface == s.street_surface) {
            Some((_, n)) => *n += 1,
            None => counts.push((s.street_surface, 1)),
        }
    }
    counts
}

fn narrative(report: &RouteReport) -> Vec<String> {
    let mut lines = Vec::new();

    let mode = match report.mode {
        RunMode::Race => "race",
        RunMode::Tour => "tour",
    };
    lines.push(format!(
        "The {:.2} km {} was divided into {} segments with a mean risk of {:.1} (maximum {}).",
        report.distance_km, mode, report.segment_count, report.mean_risk, report.max_risk
    ));

    let high = report.risk_histogram[2] + report.risk_histogram[3] + report.risk_histogram[4];
    if high == 0 {
        lines.push("No segment reaches an elevated risk level.".to_string());
    } else {
        lines.push(format!(
            "{} segments have elevated risk (3 or higher); {} medical positions are recommended.",
            high, report.sani_count
        ));
    }

    let t = &report.terrain;
    if t.ascent_segments + t.descent_segments > 0 {
        lines.push(format!(
            "Terrain: {} climbing segments (up to {:.1}%), {} descending (down to {:.1}%), {} flat.",
            t.ascent_segments, t.max_ascent_pct, t.descent_segments, t.max_descent_pct, t.flat_segments
        ));
    } else {
        lines.push("The route is flat throughout.".to_string());
    }

    if let Some(w) = &report.weather {
        lines.push(format!(
            "Weather: {} with {:.0} to {:.0} °C, wind up to {:.0} km/h and up to {:.1} mm precipitation.",
            w.conditions.join(", "),
            w.min_temperature,
            w.max_temperature,
            w.max_wind_speed,
            w.max_precip
        ));
    }

    if report.sharp_curve_segments > 0 {
        lines.push(format!("{} segments contain sharp curves.", report.sharp_curve_segments));
    }
    if report.nighttime_segments > 0 {
        lines.push(format!(
            "{} segments are ridden in darkness.",
            report.nighttime_segments
        ));
    }

    if !report.injuries.is_empty() {
        let top: Vec<&str> = report.injuries.iter().take(3).map(|f| f.injury.label()).collect();
        lines.push(format!("Most likely injuries: {}.", top.join(", ")));
    }

    lines
}

/// Aggregate a run.
pub fn build_report(result: &RunResult) -> RouteReport {
    let segments = &result.segments;
    let segment_count = segments.len();

    let mut risk_histogram = [0usize; 5];
    for s in segments {
        let slot = s.risk.clamp(1, 5) as usize - 1;
        risk_histogram[slot] += 1;
    }

    let mean_risk = if segment_count == 0 {
        0.0
    } else {
        segments.iter().map(|s| s.risk as f64).sum::<f64>() / segment_count as f64
    };

    let sani_indices: Vec<usize> = segments
        .iter()
        .filter(|s| s.sani_needed)
        .map(|s| s.index)
        .collect();

    let mut report = RouteReport {
        segment_count,
        distance_km: round2(result.distance_km),
        mode: result.mode,
        mean_risk,
        max_risk: segments.iter().map(|s| s.risk).max().unwrap_or(0),
        risk_histogram,
        sani_count: sani_indices.len(),
        sani_indices,
        injuries: injury_frequencies(result),
        terrain: terrain_summary(result),
        weather: weather_summary(result),
        nighttime_segments: segments.iter().filter(|s| s.nighttime).count(),
        sharp_curve_segments: segments.iter().filter(|s| s.sharp_curve).count(),
        surface_counts: surface_counts(result),
        narrative: Vec::new(),
    };
    report.narrative = narrative(&report);
    report
}

/// Run a renderer, reporting any failure as [`RiskError::ReportFailure`].
pub fn render_report(renderer: &dyn ReportRenderer, report: &RouteReport) -> Result<String> {
    renderer.render(report).map_err(|e| {
        warn!("[RouteReport] Renderer failed: {}", e);
        match e {
            RiskError::ReportFailure { .. } => e,
            other => RiskError::ReportFailure {
                message: other.to_string(),
            },
        }
    })
}

/// Plain-text rendering: the narrative, one sentence per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReport;

impl ReportRenderer for TextReport {
    fn render(&self, report: &RouteReport) -> Result<String> {
        let mut out = report.narrative.join("\n");
        if !report.sani_indices.is_empty() {
            out.push_str("\nMedical positions at segments: ");
            let indices: Vec<String> = report.sani_indices.iter().map(|i| i.to_string()).collect();
            out.push_str(&indices.join(", "));
        }
        Ok(out)
    }
}
