//! Weather resolver boundary.
//!
//! The pipeline never talks to a weather service directly. It asks a [`WeatherProvider`]
//! for readings through [`WeatherResolver`], which:
//! - applies a caller override uniformly (no lookups at all)
//! - otherwise queries sparsely: one reading per `weather_band_km` of path distance,
//!   reused by every segment in that band
//! - substitutes the configured default reading when a lookup fails

use crate::error::{Result, RiskError};
use crate::segmenter::SegmentGeometry;
use crate::GpsPoint;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Weather at one place and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Air temperature (°C)
    pub temperature: f64,
    /// Wind speed (km/h)
    pub wind_speed: f64,
    /// Precipitation (mm)
    pub precip: f64,
    /// Free-text condition, e.g. "clear", "light rain", "klar"
    pub condition: String,
}

impl WeatherReading {
    pub fn new(temperature: f64, wind_speed: f64, precip: f64, condition: &str) -> Self {
        Self {
            temperature,
            wind_speed,
            precip,
            condition: condition.to_string(),
        }
    }

    /// Classified condition.
    pub fn classify(&self) -> WeatherCondition {
        WeatherCondition::from_text(&self.condition)
    }
}

/// Condition classes recognised by the risk rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    Snow,
    Ice,
    Fog,
    Storm,
    Unknown,
}

/// Keyword table, checked in order; the first class with a matching keyword wins.
/// Severe classes come first so "thunderstorm with rain" is a storm.
const CONDITION_KEYWORDS: &[(WeatherCondition, &[&str])] = &[
    (WeatherCondition::Storm, &["storm", "thunder", "gewitter", "sturm", "hail", "hagel"]),
    (WeatherCondition::Ice, &["ice", "icy", "freezing", "glatteis", "eis", "frost"]),
    (WeatherCondition::Snow, &["snow", "sleet", "schnee"]),
    (WeatherCondition::Rain, &["rain", "drizzle", "shower", "regen", "niesel", "schauer"]),
    (WeatherCondition::Fog, &["fog", "mist", "haze", "nebel", "dunst"]),
    (WeatherCondition::Cloudy, &["cloud", "overcast", "wolk", "wölk", "bedeckt"]),
    (WeatherCondition::Clear, &["clear", "sun", "fair", "klar", "sonn", "heiter"]),
];

impl WeatherCondition {
    /// Classify a free-text condition (English or German, case-insensitive).
    pub fn from_text(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return WeatherCondition::Unknown;
        }
        CONDITION_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(class, _)| *class)
            .unwrap_or(WeatherCondition::Unknown)
    }

    /// Conditions that reduce grip or visibility.
    pub fn is_adverse(&self) -> bool {
        matches!(
            self,
            WeatherCondition::Rain
                | WeatherCondition::Snow
                | WeatherCondition::Ice
                | WeatherCondition::Fog
                | WeatherCondition::Storm
        )
    }
}

/// A single lookup: where and when.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub location: GpsPoint,
    pub timestamp: DateTime<Utc>,
}

/// Something that can supply weather readings.
///
/// Implementations may block or time out; the resolver treats every error as
/// [`RiskError::WeatherUnavailable`] and recovers with a default reading.
pub trait WeatherProvider: Send + Sync {
    /// Resolve one query.
    fn resolve(&self, query: &WeatherQuery) -> Result<WeatherReading>;

    /// Resolve several queries; results are in query order.
    fn resolve_batch(&self, queries: &[WeatherQuery]) -> Vec<Result<WeatherReading>> {
        queries.iter().map(|q| self.resolve(q)).collect()
    }
}

/// Provider that answers every query with the same reading.
#[derive(Debug, Clone)]
pub struct FixedWeather {
    reading: WeatherReading,
}

impl FixedWeather {
    pub fn new(reading: WeatherReading) -> Self {
        Self { reading }
    }
}

impl WeatherProvider for FixedWeather {
    fn resolve(&self, _query: &WeatherQuery) -> Result<WeatherReading> {
        Ok(self.reading.clone())
    }
}

/// Provider that always fails, for running without any weather source.
#[derive(Debug, Clone, Default)]
pub struct NoWeather;

impl WeatherProvider for NoWeather {
    fn resolve(&self, _query: &WeatherQuery) -> Result<WeatherReading> {
        Err(RiskError::WeatherUnavailable {
            message: "no weather provider configured".to_string(),
        })
    }
}

/// Attaches a weather reading to every segment.
pub struct WeatherResolver<'a> {
    provider: &'a dyn WeatherProvider,
    band_km: f64,
    fallback: WeatherReading,
}

impl<'a> WeatherResolver<'a> {
    pub fn new(provider: &'a dyn WeatherProvider, band_km: f64, fallback: WeatherReading) -> Self {
        Self {
            provider,
            band_km,
            fallback,
        }
    }

    /// One reading per segment, in segment order.
    ///
    /// `timestamps[i]` is when segment `i` is expected to be reached.
    pub fn resolve_segments(
        &self,
        segments: &[SegmentGeometry],
        timestamps: &[DateTime<Utc>],
        override_reading: Option<&WeatherReading>,
    ) -> Vec<WeatherReading> {
        if let Some(reading) = override_reading {
            debug!(
                "[WeatherResolver] Applying override to {} segments",
                segments.len()
            );
            return vec![reading.clone(); segments.len()];
        }

        let anchors = band_anchors(segments, self.band_km);
        let queries: Vec<WeatherQuery> = anchors
            .iter()
            .map(|&i| WeatherQuery {
                location: segments[i].center,
                timestamp: timestamps[i],
            })
            .collect();

        let readings: Vec<WeatherReading> = self
            .provider
            .resolve_batch(&queries)
            .into_iter()
            .zip(queries.iter())
            .map(|(result, query)| match result {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(
                        "[WeatherResolver] Lookup at ({:.4}, {:.4}) failed, using default reading: {}",
                        query.location.latitude, query.location.longitude, e
                    );
                    self.fallback.clone()
                }
            })
            .collect();

        debug!(
            "[WeatherResolver] {} queries for {} segments (band {:.0} km)",
            queries.len(),
            segments.len(),
            self.band_km
        );

        let mut out = Vec::with_capacity(segments.len());
        let mut band = 0;
        for i in 0..segments.len() {
            while band + 1 < anchors.len() && anchors[band + 1] <= i {
                band += 1;
            }
            out.push(readings.get(band).cloned().unwrap_or_else(|| self.fallback.clone()));
        }
        out
    }
}

/// Indices of the segments that start a new weather band.
fn band_anchors(segments: &[SegmentGeometry], band_km: f64) -> Vec<usize> {
    let mut anchors = Vec::new();
    let mut anchor_km = f64::NEG_INFINITY;
    for (pos, s) in segments.iter().enumerate() {
        if s.start_km - anchor_km >= band_km {
            anchors.push(pos);
            anchor_km = s.start_km;
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn geometry(index: usize, start_km: f64) -> SegmentGeometry {
        SegmentGeometry {
            index,
            start_km,
            end_km: start_km + 10.0,
            length_km: 10.0,
            center: GpsPoint::new(47.0 + index as f64 * 0.1, 8.0),
            points: Vec::new(),
            slope: 0.0,
            turn_deg: 0.0,
            sharp_curve: false,
        }
    }

    /// Reports temperature = latitude so tests can see which anchor was used.
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl WeatherProvider for CountingProvider {
        fn resolve(&self, query: &WeatherQuery) -> Result<WeatherReading> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(RiskError::WeatherUnavailable {
                    message: "timeout".into(),
                });
            }
            Ok(WeatherReading::new(query.location.latitude, 5.0, 0.0, "clear"))
        }
    }

    fn now() -> Vec<DateTime<Utc>> {
        vec![Utc::now(); 12]
    }

    #[test]
    fn test_condition_keywords() {
        assert_eq!(WeatherCondition::from_text("klar"), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_text("Light Rain"), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_text("Regen"), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_text("thunderstorm with rain"), WeatherCondition::Storm);
        assert_eq!(WeatherCondition::from_text("Glatteis"), WeatherCondition::Ice);
        assert_eq!(WeatherCondition::from_text("Nebel"), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_text(""), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_text("???"), WeatherCondition::Unknown);
    }

    #[test]
    fn test_adverse_conditions() {
        assert!(WeatherCondition::Fog.is_adverse());
        assert!(WeatherCondition::Rain.is_adverse());
        assert!(!WeatherCondition::Cloudy.is_adverse());
    }

    #[test]
    fn test_override_skips_provider() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let segments: Vec<_> = (0..3).map(|i| geometry(i, i as f64 * 10.0)).collect();
        let override_reading = WeatherReading::new(2.0, 40.0, 3.0, "snow");
        let resolver = WeatherResolver::new(&provider, 50.0, WeatherReading::new(15.0, 10.0, 0.0, "clear"));

        let readings = resolver.resolve_segments(&segments, &now(), Some(&override_reading));
        assert_eq!(readings, vec![override_reading; 3]);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_sparse_queries_reused_within_band() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        // Segments start every 10 km: anchors at 0, 50, 100 km
        let segments: Vec<_> = (0..12).map(|i| geometry(i, i as f64 * 10.0)).collect();
        let resolver = WeatherResolver::new(&provider, 50.0, WeatherReading::new(15.0, 10.0, 0.0, "clear"));

        let readings = resolver.resolve_segments(&segments, &now(), None);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 3);
        assert_eq!(readings.len(), 12);
        assert_eq!(readings[4].temperature, segments[0].center.latitude);
        assert_eq!(readings[5].temperature, segments[5].center.latitude);
        assert_eq!(readings[11].temperature, segments[10].center.latitude);
    }

    #[test]
    fn test_failures_degrade_to_default() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let fallback = WeatherReading::new(15.0, 10.0, 0.0, "klar");
        let segments: Vec<_> = (0..3).map(|i| geometry(i, i as f64)).collect();
        let resolver = WeatherResolver::new(&provider, 50.0, fallback.clone());

        let readings = resolver.resolve_segments(&segments, &now(), None);
        assert_eq!(readings, vec![fallback; 3]);
    }

    #[test]
    fn test_no_weather_provider_errors() {
        let query = WeatherQuery {
            location: GpsPoint::new(0.0, 0.0),
            timestamp: Utc::now(),
        };
        assert!(matches!(
            NoWeather.resolve(&query),
            Err(RiskError::WeatherUnavailable { .. })
        ));
    }
}
