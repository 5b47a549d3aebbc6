//! Open-Meteo weather provider.
//!
//! Resolves [`WeatherQuery`]s against the Open-Meteo hourly forecast:
//! - One shared connection-pooled client
//! - Request starts spaced by a dispatch interval (free tier allows ~10 req/s)
//! - Bounded concurrency for batches
//! - Retry with exponential backoff on 429 and transport errors
//!
//! [`WeatherProvider`] is synchronous, so batches run on a short-lived tokio runtime.
//! Async callers can use [`OpenMeteoProvider::fetch_readings`] directly.

use crate::error::{Result, RiskError};
use crate::weather::{WeatherProvider, WeatherQuery, WeatherReading};
use chrono::{DateTime, Timelike, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const PUBLIC_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const CUSTOMER_ENDPOINT: &str = "https://customer-api.open-meteo.com/v1/forecast";
const HOURLY_FIELDS: &str = "temperature_2m,wind_speed_10m,precipitation,weather_code";

/// Client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenMeteoConfig {
    pub endpoint: String,
    /// Sent as `apikey`; required by the customer endpoint
    pub api_key: Option<String>,
    pub require_api_key: bool,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum spacing between request starts
    pub dispatch_interval: Duration,
    pub max_concurrency: usize,
    pub max_retries: u32,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            endpoint: PUBLIC_ENDPOINT.to_string(),
            api_key: None,
            require_api_key: false,
            timeout: Duration::from_secs(10),
            dispatch_interval: Duration::from_millis(100),
            max_concurrency: 4,
            max_retries: 3,
        }
    }
}

impl OpenMeteoConfig {
    /// Commercial endpoint. An empty key is treated as missing.
    pub fn customer(api_key: Option<String>) -> Self {
        Self {
            endpoint: CUSTOMER_ENDPOINT.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            require_api_key: true,
            ..Self::default()
        }
    }

    /// Customer endpoint if `OPEN_METEO_API_KEY` is set, public endpoint otherwise.
    pub fn from_env() -> Self {
        match std::env::var("OPEN_METEO_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::customer(Some(key)),
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    weather_code: Vec<Option<u32>>,
}

/// Condition text for a WMO weather interpretation code.
pub fn wmo_condition(code: u32) -> &'static str {
    match code {
        0 => "clear",
        1..=3 => "cloudy",
        45 | 48 => "fog",
        51..=55 => "drizzle",
        56 | 57 | 66 | 67 => "freezing rain",
        61..=65 | 80..=82 => "rain",
        71..=77 | 85 | 86 => "snow",
        95..=99 => "thunderstorm",
        _ => "unknown",
    }
}

fn first_value(values: &[Option<f64>], name: &str) -> Result<f64> {
    values
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| RiskError::WeatherUnavailable {
            message: format!("response has no {} value", name),
        })
}

fn reading_from_series(series: &HourlySeries) -> Result<WeatherReading> {
    if series.time.is_empty() {
        return Err(RiskError::WeatherUnavailable {
            message: "response has no hourly data".to_string(),
        });
    }

    let condition = series
        .weather_code
        .first()
        .copied()
        .flatten()
        .map_or("unknown", wmo_condition);

    Ok(WeatherReading::new(
        first_value(&series.temperature_2m, "temperature_2m")?,
        first_value(&series.wind_speed_10m, "wind_speed_10m")?,
        first_value(&series.precipitation, "precipitation")?,
        condition,
    ))
}

/// Hour containing `ts`, formatted for `start_hour`/`end_hour`.
fn hour_param(ts: DateTime<Utc>) -> String {
    let hour = ts
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts);
    hour.format("%Y-%m-%dT%H:%M").to_string()
}

/// Spaces out when requests start and tracks consecutive 429s.
struct DispatchLimiter {
    next_slot: Mutex<Instant>,
    interval: Duration,
    consecutive_429s: std::sync::atomic::AtomicU32,
}

impl DispatchLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            next_slot: Mutex::new(Instant::now()),
            interval,
            consecutive_429s: std::sync::atomic::AtomicU32::new(0),
        }
    }

    async fn wait_for_slot(&self) {
        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.interval;
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn record_success(&self) {
        self.consecutive_429s
            .store(0, std::sync::atomic::Ordering::Relaxed);
    }

    /// Backoff for the next retry: 500 ms, 1 s, 2 s, 4 s max.
    fn record_429(&self) -> Duration {
        let count = self
            .consecutive_429s
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        Duration::from_millis(500 * (1 << count.min(4).saturating_sub(1)))
    }
}

/// Backoff after a transport error: 400 ms, 800 ms, 1.6 s, 3.2 s max.
fn transport_backoff(retries: u32) -> Duration {
    Duration::from_millis(200 * (1 << retries.clamp(1, 4)))
}

/// [`WeatherProvider`] backed by Open-Meteo.
pub struct OpenMeteoProvider {
    client: Client,
    config: OpenMeteoConfig,
    limiter: DispatchLimiter,
}

impl OpenMeteoProvider {
    pub fn new(config: OpenMeteoConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_concurrency.max(1))
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(config.timeout)
            .build()
            .map_err(|e| RiskError::WeatherUnavailable {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            limiter: DispatchLimiter::new(config.dispatch_interval),
            client,
            config,
        })
    }

    fn check_credentials(&self) -> Result<()> {
        if self.config.require_api_key && self.config.api_key.is_none() {
            return Err(RiskError::WeatherUnavailable {
                message: "Open-Meteo API key missing for customer endpoint".to_string(),
            });
        }
        Ok(())
    }

    fn query_params(&self, query: &WeatherQuery) -> Vec<(&'static str, String)> {
        let hour = hour_param(query.timestamp);
        let mut params = vec![
            ("latitude", format!("{:.4}", query.location.latitude)),
            ("longitude", format!("{:.4}", query.location.longitude)),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", "GMT".to_string()),
            ("start_hour", hour.clone()),
            ("end_hour", hour),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("apikey", key.clone()));
        }
        params
    }

    async fn fetch_one(&self, query: &WeatherQuery) -> Result<WeatherReading> {
        self.check_credentials()?;
        let params = self.query_params(query);
        let mut retries = 0;

        loop {
            self.limiter.wait_for_slot().await;
            let response = self
                .client
                .get(&self.config.endpoint)
                .query(&params)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > self.config.max_retries {
                            return Err(RiskError::WeatherUnavailable {
                                message: "rate limited, retries exhausted".to_string(),
                            });
                        }
                        let wait = self.limiter.record_429();
                        warn!("[OpenMeteo] 429, retry {} after {:?}", retries, wait);
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    self.limiter.record_success();

                    if !status.is_success() {
                        return Err(RiskError::WeatherUnavailable {
                            message: format!("HTTP {}", status),
                        });
                    }

                    let body: ForecastResponse =
                        resp.json().await.map_err(|e| RiskError::WeatherUnavailable {
                            message: format!("invalid forecast response: {}", e),
                        })?;
                    return reading_from_series(&body.hourly);
                }
                Err(e) => {
                    retries += 1;
                    if retries > self.config.max_retries {
                        return Err(RiskError::WeatherUnavailable {
                            message: format!("request failed: {}", e),
                        });
                    }
                    let wait = transport_backoff(retries);
                    warn!("[OpenMeteo] Error: {}, retry {} after {:?}", e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Resolve queries with bounded concurrency; results are in query order.
    pub async fn fetch_readings(&self, queries: &[WeatherQuery]) -> Vec<Result<WeatherReading>> {
        use futures::stream::{self, StreamExt};

        let started = Instant::now();
        let results: Vec<Result<WeatherReading>> = stream::iter(queries)
            .map(|q| self.fetch_one(q))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        info!(
            "[OpenMeteo] {}/{} readings in {:.2}s",
            results.iter().filter(|r| r.is_ok()).count(),
            queries.len(),
            started.elapsed().as_secs_f64()
        );
        results
    }
}

impl WeatherProvider for OpenMeteoProvider {
    fn resolve(&self, query: &WeatherQuery) -> Result<WeatherReading> {
        self.resolve_batch(std::slice::from_ref(query))
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                Err(RiskError::WeatherUnavailable {
                    message: "no result".to_string(),
                })
            })
    }

    fn resolve_batch(&self, queries: &[WeatherQuery]) -> Vec<Result<WeatherReading>> {
        if queries.is_empty() {
            return Vec::new();
        }
        if let Err(e) = self.check_credentials() {
            return queries.iter().map(|_| Err(e.clone())).collect();
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                let err = RiskError::WeatherUnavailable {
                    message: format!("failed to start runtime: {}", e),
                };
                return queries.iter().map(|_| Err(err.clone())).collect();
            }
        };

        // Bound the whole batch, not just single requests
        let per_query = self
            .config
            .timeout
            .saturating_mul(self.config.max_retries.saturating_add(1));
        let waves = queries.len().div_ceil(self.config.max_concurrency.max(1));
        let budget = per_query.saturating_mul(u32::try_from(waves).unwrap_or(u32::MAX));
        debug!("[OpenMeteo] Resolving {} queries (budget {:?})", queries.len(), budget);

        runtime.block_on(async {
            match tokio::time::timeout(budget, self.fetch_readings(queries)).await {
                Ok(results) => results,
                Err(_) => {
                    warn!("[OpenMeteo] Batch timed out after {:?}", budget);
                    queries
                        .iter()
                        .map(|_| {
                            Err(RiskError::WeatherUnavailable {
                                message: "batch timed out".to_string(),
                            })
                        })
                        .collect()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpsPoint;
    use chrono::TimeZone;

    fn query() -> WeatherQuery {
        WeatherQuery {
            location: GpsPoint::new(47.3769, 8.5417),
            timestamp: Utc.with_ymd_and_hms(2025, 5, 11, 10, 42, 13).unwrap(),
        }
    }

    #[test]
    fn test_wmo_codes() {
        assert_eq!(wmo_condition(0), "clear");
        assert_eq!(wmo_condition(2), "cloudy");
        assert_eq!(wmo_condition(63), "rain");
        assert_eq!(wmo_condition(75), "snow");
        assert_eq!(wmo_condition(96), "thunderstorm");
        assert_eq!(wmo_condition(1234), "unknown");
    }

    #[test]
    fn test_parse_forecast() {
        let body: ForecastResponse = serde_json::from_str(
            r#"{
                "latitude": 47.38, "longitude": 8.54,
                "hourly": {
                    "time": ["2025-05-11T10:00"],
                    "temperature_2m": [12.4],
                    "wind_speed_10m": [18.0],
                    "precipitation": [1.6],
                    "weather_code": [61]
                }
            }"#,
        )
        .unwrap();
        let reading = reading_from_series(&body.hourly).unwrap();
        assert_eq!(reading, WeatherReading::new(12.4, 18.0, 1.6, "rain"));
    }

    #[test]
    fn test_missing_values_are_unavailable() {
        let body: ForecastResponse = serde_json::from_str(
            r#"{ "hourly": {
                "time": ["2025-05-11T10:00"],
                "temperature_2m": [null],
                "wind_speed_10m": [3.0],
                "precipitation": [0.0],
                "weather_code": [0]
            } }"#,
        )
        .unwrap();
        assert!(matches!(
            reading_from_series(&body.hourly),
            Err(RiskError::WeatherUnavailable { .. })
        ));
    }

    #[test]
    fn test_query_params_hour_and_key() {
        let provider =
            OpenMeteoProvider::new(OpenMeteoConfig::customer(Some("secret".to_string()))).unwrap();
        let params = provider.query_params(&query());
        assert!(params.contains(&("start_hour", "2025-05-11T10:00".to_string())));
        assert!(params.contains(&("apikey", "secret".to_string())));
        assert!(params.contains(&("latitude", "47.3769".to_string())));
    }

    #[test]
    fn test_missing_customer_key_fails_without_request() {
        let provider = OpenMeteoProvider::new(OpenMeteoConfig::customer(Some("  ".to_string()))).unwrap();
        let results = provider.resolve_batch(&[query(), query()]);
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(RiskError::WeatherUnavailable { .. }))));
    }

    #[tokio::test]
    async fn test_dispatch_limiter_spacing() {
        let limiter = DispatchLimiter::new(Duration::from_millis(40));

        let start = Instant::now();
        limiter.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_millis(20));

        limiter.wait_for_slot().await;
        limiter.wait_for_slot().await;
        assert!(start.elapsed() >= Duration::from_millis(75));
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let limiter = DispatchLimiter::new(Duration::ZERO);
        assert_eq!(limiter.record_429(), Duration::from_millis(500));
        assert_eq!(limiter.record_429(), Duration::from_millis(1000));
        limiter.record_success();
        assert_eq!(limiter.record_429(), Duration::from_millis(500));
    }

    #[test]
    fn test_transport_backoff_is_capped() {
        assert_eq!(transport_backoff(1), Duration::from_millis(400));
        assert_eq!(transport_backoff(3), Duration::from_millis(1600));
        assert_eq!(transport_backoff(4), Duration::from_millis(3200));
        assert_eq!(transport_backoff(64), Duration::from_millis(3200));
        assert_eq!(transport_backoff(u32::MAX), Duration::from_millis(3200));
    }
}
