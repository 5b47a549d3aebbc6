//! Pipeline configuration.
//!
//! Every field has a default, so callers can load a partial JSON document and only
//! override what they need:
//!
//! ```rust
//! use route_risk::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{ "weather_band_km": 25.0 }"#).unwrap();
//! assert_eq!(config.weather_band_km, 25.0);
//! assert_eq!(config.segment_length_km, 0.005);
//! ```

use crate::error::{Result, RiskError};
use crate::weather::WeatherReading;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for [`crate::analyze_route`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target segment length in kilometers.
    /// Default: 0.005 (5 meters)
    pub segment_length_km: f64,

    /// Maximum number of track points accepted per request.
    /// Default: 100,000
    pub max_points: usize,

    /// Maximum number of segments. Longer tracks get a wider segment length instead of failing.
    /// Default: 10,000
    pub max_segments: usize,

    /// Start time used when the request carries none. `None` makes the start time mandatory.
    /// Default: 2025-05-11T10:00:00Z
    pub default_start_time: Option<DateTime<Utc>>,

    /// Reading substituted when the weather provider fails.
    pub default_weather: WeatherReading,

    /// One weather query is reused for all segments within this path distance.
    /// Default: 50.0 km
    pub weather_band_km: f64,

    /// Average speed for estimating when each segment is reached.
    /// Default: 20.0 km/h
    pub average_speed_kmh: f64,

    /// Grade beyond which a segment counts as ascent/descent.
    /// Default: 2.0 %
    pub terrain_slope_pct: f64,

    pub thresholds: RiskThresholds,

    pub selector: SelectorConfig,
}

/// Plausible range for `average_speed_kmh`.
pub const MIN_AVERAGE_SPEED_KMH: f64 = 1.0;
pub const MAX_AVERAGE_SPEED_KMH: f64 = 200.0;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_length_km: 0.005,
            max_points: 100_000,
            max_segments: 10_000,
            default_start_time: Utc.with_ymd_and_hms(2025, 5, 11, 10, 0, 0).single(),
            default_weather: WeatherReading::new(15.0, 10.0, 0.0, "clear"),
            weather_band_km: 50.0,
            average_speed_kmh: 20.0,
            terrain_slope_pct: 2.0,
            thresholds: RiskThresholds::default(),
            selector: SelectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| RiskError::ConfigError {
            message: format!("invalid config JSON: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RiskError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("segment_length_km", self.segment_length_km),
            ("weather_band_km", self.weather_band_km),
            ("average_speed_kmh", self.average_speed_kmh),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RiskError::ConfigError {
                    message: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        if !(MIN_AVERAGE_SPEED_KMH..=MAX_AVERAGE_SPEED_KMH).contains(&self.average_speed_kmh) {
            return Err(RiskError::ConfigError {
                message: format!(
                    "average_speed_kmh must be within {}..={}, got {}",
                    MIN_AVERAGE_SPEED_KMH, MAX_AVERAGE_SPEED_KMH, self.average_speed_kmh
                ),
            });
        }
        if self.max_points < 2 || self.max_segments == 0 {
            return Err(RiskError::ConfigError {
                message: "max_points must be >= 2 and max_segments >= 1".to_string(),
            });
        }
        if !(1..=5).contains(&self.selector.risk_threshold) {
            return Err(RiskError::ConfigError {
                message: format!(
                    "selector.risk_threshold must be within 1..=5, got {}",
                    self.selector.risk_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Thresholds that decide when a risk factor fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Absolute grade above which ascent/descent counts as steep (%)
    pub steep_slope_pct: f64,
    /// Cumulative turn within one segment that counts as a sharp curve (degrees)
    pub sharp_curve_deg: f64,
    /// Temperature at or below which it counts as cold (°C)
    pub cold_temperature_c: f64,
    /// Wind at or above which it counts as strong (km/h)
    pub strong_wind_kmh: f64,
    /// Precipitation at or above which the road counts as wet (mm)
    pub precipitation_mm: f64,
    /// Field size above which collisions become likely
    pub large_field_participants: u32,
    /// Riders younger than this are in the young band
    pub young_rider_age: u32,
    /// Riders this age or older are in the senior band
    pub senior_rider_age: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            steep_slope_pct: 4.0,
            sharp_curve_deg: 60.0,
            cold_temperature_c: 5.0,
            strong_wind_kmh: 25.0,
            precipitation_mm: 1.0,
            large_field_participants: 80,
            young_rider_age: 18,
            senior_rider_age: 60,
        }
    }
}

/// Marker selection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Minimum risk for a segment to need (or join a cluster needing) a marker
    pub risk_threshold: u8,
    /// Minimum index distance between two race-mode markers
    pub min_spacing: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 3,
            min_spacing: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.segment_length_km, 0.005);
        assert_eq!(config.max_points, 100_000);
        assert_eq!(config.max_segments, 10_000);
        assert_eq!(config.default_weather.temperature, 15.0);
        assert_eq!(
            config.default_start_time.map(|t| t.to_rfc3339()),
            Some("2025-05-11T10:00:00+00:00".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "thresholds": { "strong_wind_kmh": 30.0 }, "selector": { "min_spacing": 8 } }"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.strong_wind_kmh, 30.0);
        assert_eq!(config.thresholds.sharp_curve_deg, 60.0);
        assert_eq!(config.selector.min_spacing, 8);
        assert_eq!(config.selector.risk_threshold, 3);
    }

    #[test]
    fn test_null_start_time_makes_it_mandatory() {
        let config = PipelineConfig::from_json_str(r#"{ "default_start_time": null }"#).unwrap();
        assert!(config.default_start_time.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "segment_length_km": 0.0 }"#),
            Err(RiskError::ConfigError { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{ "selector": { "risk_threshold": 9 } }"#),
            Err(RiskError::ConfigError { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json_str("not json"),
            Err(RiskError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_average_speed_must_be_plausible() {
        for json in [
            r#"{ "average_speed_kmh": 1e-12 }"#,
            r#"{ "average_speed_kmh": 0.5 }"#,
            r#"{ "average_speed_kmh": 1000.0 }"#,
        ] {
            assert!(
                matches!(
                    PipelineConfig::from_json_str(json),
                    Err(RiskError::ConfigError { .. })
                ),
                "{}",
                json
            );
        }
        assert!(PipelineConfig::from_json_str(r#"{ "average_speed_kmh": 1.0 }"#).is_ok());
        assert!(PipelineConfig::from_json_str(r#"{ "average_speed_kmh": 200.0 }"#).is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            PipelineConfig::from_json_file("/nonexistent/route-risk.json"),
            Err(RiskError::ConfigError { .. })
        ));
    }
}
