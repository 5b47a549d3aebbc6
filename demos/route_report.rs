//! Analyze a short descent with a sharp hairpin and print the report.
//!
//! Run with: cargo run --example route_report
//! Verbose: RUST_LOG=debug cargo run --example route_report

use route_risk::map::render_map;
use route_risk::{
    analyze_route, build_overlay, build_report, render_report, FixedWeather, MapArtifact,
    MapOverlay, MapRenderer, PipelineConfig, RaceType, RiderContext, RiderType, RouteRequest,
    StreetSurface, SurfaceAnnotation, SurfaceMap, TextReport, TrackPoint, WeatherReading,
};

/// Writes the overlay as GeoJSON next to the working directory.
struct GeoJsonFile {
    path: std::path::PathBuf,
}

impl MapRenderer for GeoJsonFile {
    fn render(&self, overlay: &MapOverlay) -> route_risk::Result<MapArtifact> {
        let body = overlay.to_geojson().to_string();
        std::fs::write(&self.path, body).map_err(|e| route_risk::RiskError::RenderingFailure {
            message: format!("cannot write {}: {}", self.path.display(), e),
        })?;
        Ok(MapArtifact {
            reference: self.path.display().to_string(),
        })
    }
}

fn main() {
    env_logger::init();

    // ~300 m descending north at 9 %, then a hairpin back south
    let mut track: Vec<TrackPoint> = (0..=30)
        .map(|i| TrackPoint::with_elevation(46.5 + i as f64 * 0.00009, 7.9, 900.0 - i as f64 * 0.9))
        .collect();
    track.extend((1..=15).map(|i| {
        TrackPoint::with_elevation(46.5027 - i as f64 * 0.00009, 7.9003, 873.0 - i as f64 * 0.9)
    }));

    let rider = RiderContext {
        rider_type: RiderType::LicenseC,
        age: 24,
        race_type: Some(RaceType::Mtb),
        mass_start: true,
        participants: 120,
        ..RiderContext::default()
    };

    let surfaces = SurfaceMap::new(
        vec![SurfaceAnnotation {
            location: route_risk::GpsPoint::new(46.5027, 7.90015),
            surface: StreetSurface::Gravel,
        }],
        40.0,
    );

    let request = RouteRequest {
        rider,
        start_time: Some("2025-05-11T09:30:00+02:00".to_string()),
        weather_override: Some(WeatherReading::new(9.0, 28.0, 2.5, "leichter Regen")),
        mode: None,
        surfaces,
    };

    let config = PipelineConfig::default();
    let provider = FixedWeather::new(config.default_weather.clone());

    let result = match analyze_route(&track, &request, &config, &provider) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("analysis failed: {}", e);
            std::process::exit(if e.is_input_error() { 2 } else { 1 });
        }
    };

    let report = build_report(&result);
    match render_report(&TextReport, &report) {
        Ok(text) => println!("{}\n", text),
        Err(e) => eprintln!("report failed: {}", e),
    }

    for f in report.injuries.iter().take(5) {
        println!("  {:<28} {} segments", f.injury.label(), f.segments);
    }

    let overlay = build_overlay(&result);
    let renderer = GeoJsonFile {
        path: std::env::temp_dir().join("route_risk_overlay.geojson"),
    };
    match render_map(&renderer, &overlay) {
        Ok(artifact) => println!("\nMap overlay written to {}", artifact.reference),
        Err(e) => eprintln!("map failed: {}", e),
    }
}
