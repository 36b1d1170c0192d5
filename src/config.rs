//! Configuration module for the urban-pulse services.
//!
//! This module provides environment-based configuration shared by the
//! scheduler service and the model server: endpoint URLs, the scheduling
//! interval, HTTP timeouts, and the retry budget.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default weather source endpoint (Open-Meteo hourly temperatures for the
/// same area the simulated traffic rows cover).
const DEFAULT_WEATHER_URL: &str =
    "https://api.open-meteo.com/v1/forecast?latitude=12.97&longitude=77.59&hourly=temperature_2m";

/// Default backend endpoint receiving enriched prediction batches
const DEFAULT_BACKEND_URL: &str = "http://localhost:8081/api/predictions";

/// Default model-serving prediction endpoint
const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:9000/predict";

/// Default path of the trained model artifact
const DEFAULT_MODEL_PATH: &str = "./models/traffic_model.json";

/// Default bind address for the model server
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

/// Default scheduling interval in minutes
const DEFAULT_INTERVAL_MINUTES: u64 = 30;

/// Default number of simulated traffic rows fetched per tick
const DEFAULT_ROWS_PER_TICK: usize = 5;

/// Default outbound HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default retry budget for GET fetches
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Minimum scheduling interval to keep the pipeline from hammering upstreams
const MIN_INTERVAL_MINUTES: u64 = 1;

/// Maximum scheduling interval (one day)
const MAX_INTERVAL_MINUTES: u64 = 1440;

/// Maximum rows per tick to bound per-tick prediction fan-out
const MAX_ROWS_PER_TICK: usize = 1000;

/// Maximum retry budget
const MAX_MAX_RETRIES: u32 = 10;

/// Configuration for the urban-pulse services.
///
/// All settings can be configured via environment variables:
/// - `URBAN_PULSE_WEATHER_URL`: weather source endpoint
/// - `URBAN_PULSE_BACKEND_URL`: backend endpoint for enriched batches
/// - `URBAN_PULSE_PREDICT_URL`: model-serving prediction endpoint
/// - `URBAN_PULSE_MODEL_PATH`: trained model artifact path
/// - `URBAN_PULSE_BIND_ADDR`: model server bind address (default: 0.0.0.0:9000)
/// - `URBAN_PULSE_INTERVAL_MINUTES`: minutes between pipeline ticks (default: 30)
/// - `URBAN_PULSE_ROWS_PER_TICK`: simulated traffic rows per tick (default: 5)
/// - `URBAN_PULSE_REQUEST_TIMEOUT_SECS`: outbound HTTP timeout (default: 10)
/// - `URBAN_PULSE_MAX_RETRIES`: retry budget for GET fetches (default: 3)
#[derive(Debug, Clone)]
pub struct Config {
    /// Weather source endpoint (hourly temperature series)
    pub weather_url: String,

    /// Backend endpoint receiving the enriched batch after each tick
    pub backend_url: String,

    /// Model-serving endpoint queried once per traffic row
    pub predict_url: String,

    /// Path of the trained model artifact loaded by the model server
    pub model_path: String,

    /// Bind address for the model server process
    pub bind_addr: String,

    /// Duration between pipeline ticks
    pub interval: Duration,

    /// Number of simulated traffic rows fetched per tick
    pub rows_per_tick: usize,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,

    /// Retry budget for upstream GET fetches, counted after the first attempt
    pub max_retries: u32,
}

/// Error type for configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse or validate
    #[error("configuration error for {var}: {message}")]
    Invalid {
        var: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns a new `Config` with values from the environment, falling back
    /// to defaults where variables are unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable is not a valid number or
    /// falls outside its allowed bounds. Configuration errors are fatal at
    /// startup; there is no sensible fallback for a misconfigured service.
    pub fn from_env() -> Result<Self, ConfigError> {
        let weather_url = read_url("URBAN_PULSE_WEATHER_URL", DEFAULT_WEATHER_URL);
        let backend_url = read_url("URBAN_PULSE_BACKEND_URL", DEFAULT_BACKEND_URL);
        let predict_url = read_url("URBAN_PULSE_PREDICT_URL", DEFAULT_PREDICT_URL);

        let model_path = env::var("URBAN_PULSE_MODEL_PATH")
            .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string());

        let bind_addr =
            env::var("URBAN_PULSE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let interval_minutes = Self::parse_interval_minutes()?;
        let interval = Duration::from_secs(interval_minutes * 60);

        let rows_per_tick = Self::parse_rows_per_tick()?;
        let max_retries = Self::parse_max_retries()?;

        let request_timeout_secs: u64 = env::var("URBAN_PULSE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let request_timeout = Duration::from_secs(request_timeout_secs);

        Ok(Self {
            weather_url,
            backend_url,
            predict_url,
            model_path,
            bind_addr,
            interval,
            rows_per_tick,
            request_timeout,
            max_retries,
        })
    }

    /// Parse the scheduling interval from the environment with validation.
    fn parse_interval_minutes() -> Result<u64, ConfigError> {
        let var = "URBAN_PULSE_INTERVAL_MINUTES";

        match env::var(var) {
            Ok(value) => {
                let minutes: u64 = value.parse().map_err(|_| {
                    ConfigError::invalid(var, format!("'{}' is not a valid number", value))
                })?;

                if minutes < MIN_INTERVAL_MINUTES {
                    return Err(ConfigError::invalid(
                        var,
                        format!(
                            "interval {} is below minimum ({} minute)",
                            minutes, MIN_INTERVAL_MINUTES
                        ),
                    ));
                }

                if minutes > MAX_INTERVAL_MINUTES {
                    return Err(ConfigError::invalid(
                        var,
                        format!(
                            "interval {} exceeds maximum ({} minutes)",
                            minutes, MAX_INTERVAL_MINUTES
                        ),
                    ));
                }

                Ok(minutes)
            }
            Err(_) => Ok(DEFAULT_INTERVAL_MINUTES),
        }
    }

    /// Parse the per-tick row count from the environment with validation.
    fn parse_rows_per_tick() -> Result<usize, ConfigError> {
        let var = "URBAN_PULSE_ROWS_PER_TICK";

        match env::var(var) {
            Ok(value) => {
                let rows: usize = value.parse().map_err(|_| {
                    ConfigError::invalid(var, format!("'{}' is not a valid number", value))
                })?;

                if rows == 0 {
                    return Err(ConfigError::invalid(var, "row count must be greater than 0"));
                }

                if rows > MAX_ROWS_PER_TICK {
                    return Err(ConfigError::invalid(
                        var,
                        format!(
                            "row count {} exceeds maximum allowed ({})",
                            rows, MAX_ROWS_PER_TICK
                        ),
                    ));
                }

                Ok(rows)
            }
            Err(_) => Ok(DEFAULT_ROWS_PER_TICK),
        }
    }

    /// Parse the retry budget from the environment with validation.
    fn parse_max_retries() -> Result<u32, ConfigError> {
        let var = "URBAN_PULSE_MAX_RETRIES";

        match env::var(var) {
            Ok(value) => {
                let retries: u32 = value.parse().map_err(|_| {
                    ConfigError::invalid(var, format!("'{}' is not a valid number", value))
                })?;

                if retries == 0 {
                    return Err(ConfigError::invalid(
                        var,
                        "retry budget must be at least 1".to_string(),
                    ));
                }

                if retries > MAX_MAX_RETRIES {
                    return Err(ConfigError::invalid(
                        var,
                        format!(
                            "retry budget {} exceeds maximum allowed ({})",
                            retries, MAX_MAX_RETRIES
                        ),
                    ));
                }

                Ok(retries)
            }
            Err(_) => Ok(DEFAULT_MAX_RETRIES),
        }
    }
}

/// Read a URL variable, trimming any trailing slash so endpoint paths can be
/// appended or compared predictably.
fn read_url(var: &str, default: &str) -> String {
    env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            predict_url: DEFAULT_PREDICT_URL.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            rows_per_tick: DEFAULT_ROWS_PER_TICK,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}
