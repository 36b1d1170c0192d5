//! Data source adapters for traffic, weather, and pollution readings.
//!
//! Traffic and pollution are simulated stand-ins for real sensor feeds and
//! never fail. Weather is fetched from a remote hourly-forecast API through
//! the retry-wrapped client and degrades to an empty result on any failure.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, Timelike};
use rand::Rng;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::Config;
use crate::http::{HttpError, RetryClient};
use crate::reading::{Batch, PollutionReading, Reading, WeatherReading};

/// Southwest corner of the simulated sensor grid, in degrees latitude.
pub const BASE_LATITUDE: f64 = 12.97;

/// Southwest corner of the simulated sensor grid, in degrees longitude.
pub const BASE_LONGITUDE: f64 = 77.59;

/// Extent of the simulated sensor grid in degrees along each axis.
pub const COORDINATE_SPREAD: f64 = 0.02;

/// Number of leading entries kept from the hourly temperature series.
pub const HOURLY_PREFIX_LEN: usize = 5;

/// Pollutants reported by the simulated pollution feed.
const POLLUTANTS: [&str; 6] = ["PM2.5", "PM10", "NO2", "O3", "CO", "SO2"];

/// Concentration unit shared by all simulated pollutants.
const POLLUTION_UNIT: &str = "µg/m³";

/// Lower bound of simulated pollutant concentrations.
const POLLUTION_MIN: f64 = 10.0;

/// Upper bound of simulated pollutant concentrations.
const POLLUTION_MAX: f64 = 80.0;

/// Simulated traffic sensor feed.
///
/// Produces readings with coordinates inside a fixed grid and an hour value
/// derived from the current local hour plus a small jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficSource;

impl TrafficSource {
    /// Create a new simulated traffic source.
    pub fn new() -> Self {
        Self
    }

    /// Fetch `count` simulated traffic readings. Never fails.
    pub fn fetch(&self, count: usize) -> Batch {
        let mut rng = rand::thread_rng();
        let current_hour = Local::now().hour();

        let readings = (0..count)
            .map(|_| {
                let latitude = BASE_LATITUDE + rng.gen::<f64>() * COORDINATE_SPREAD;
                let longitude = BASE_LONGITUDE + rng.gen::<f64>() * COORDINATE_SPREAD;
                let jitter = rng.gen_range(-1..=1);
                Reading::new(latitude, longitude, jittered_hour(current_hour, jitter))
            })
            .collect();

        let batch = Batch::new(readings);
        info!(
            tick_id = %batch.tick_id,
            rows = batch.len(),
            "fetched simulated traffic readings"
        );
        batch
    }
}

/// Apply a jitter to an hour of day and wrap the result back into `0..=23`.
fn jittered_hour(base_hour: u32, jitter: i32) -> u8 {
    (base_hour as i32 + jitter).rem_euclid(24) as u8
}

/// Shape of the hourly forecast payload returned by the weather API.
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    temperature_2m: Vec<f64>,
}

/// Remote weather feed.
///
/// One GET through the retry-wrapped client per fetch; the hourly temperature
/// series is truncated to its first [`HOURLY_PREFIX_LEN`] entries. Any failure
/// (transport, non-2xx, unexpected payload shape) is logged and reported as an
/// empty result rather than propagated.
pub struct WeatherSource {
    client: RetryClient,
    url: String,
    fetch_failures: AtomicU64,
}

impl WeatherSource {
    /// Create a weather source from the service configuration.
    pub fn new(client: RetryClient, config: &Config) -> Self {
        Self::with_settings(client, config.weather_url.clone())
    }

    /// Create a weather source against an explicit endpoint URL.
    pub fn with_settings(client: RetryClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            fetch_failures: AtomicU64::new(0),
        }
    }

    /// Get the configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of fetches that degraded to an empty result.
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    /// Fetch the hourly temperature prefix, degrading to an empty result on
    /// any failure. The failure itself is logged and counted.
    pub async fn fetch(&self) -> Vec<WeatherReading> {
        match self.try_fetch().await {
            Ok(rows) => {
                info!(rows = rows.len(), "weather data fetched");
                rows
            }
            Err(e) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    url = %self.url,
                    error = %e,
                    "failed to fetch weather data, returning empty result"
                );
                Vec::new()
            }
        }
    }

    /// Fetch the hourly temperature prefix, surfacing the typed failure.
    pub async fn try_fetch(&self) -> Result<Vec<WeatherReading>, HttpError> {
        let payload = self.client.get_json(&self.url, &[]).await?;
        parse_forecast(payload)
    }
}

/// Extract the leading hourly temperatures from a forecast payload.
///
/// A payload without `hourly.temperature_2m` is bad upstream data, reported
/// as a parse error rather than retried.
fn parse_forecast(payload: serde_json::Value) -> Result<Vec<WeatherReading>, HttpError> {
    let forecast: ForecastResponse = serde_json::from_value(payload)
        .map_err(|e| HttpError::Parse(format!("unexpected weather payload shape: {}", e)))?;

    Ok(forecast
        .hourly
        .temperature_2m
        .into_iter()
        .take(HOURLY_PREFIX_LEN)
        .enumerate()
        .map(|(index, temperature_celsius)| WeatherReading {
            hour: index as u8,
            temperature_celsius,
        })
        .collect())
}

/// Simulated pollution feed reporting a fixed set of pollutants.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollutionSource;

impl PollutionSource {
    /// Create a new simulated pollution source.
    pub fn new() -> Self {
        Self
    }

    /// Sample one reading per pollutant with concentrations uniform in
    /// `10.0..80.0`. Never fails.
    pub fn sample(&self) -> Vec<PollutionReading> {
        let mut rng = rand::thread_rng();

        let rows: Vec<PollutionReading> = POLLUTANTS
            .iter()
            .map(|pollutant| PollutionReading {
                pollutant: pollutant.to_string(),
                value: rng.gen_range(POLLUTION_MIN..POLLUTION_MAX),
                unit: POLLUTION_UNIT.to_string(),
            })
            .collect();

        info!(rows = rows.len(), "generated simulated pollution readings");
        rows
    }
}
