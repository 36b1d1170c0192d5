//! Urban Pulse Library
//!
//! This library provides components for an urban telemetry pipeline:
//!
//! - **config**: Environment-based configuration shared by the binaries
//! - **reading**: Readings, batches, and the wire types built from them
//! - **sources**: Traffic, weather, and pollution data source adapters
//! - **http**: Pooled HTTP client with bounded retries for upstream fetches
//! - **predict**: Per-row prediction client with scheduler-side fallback
//! - **sink**: Delivery of enriched batches to the backend
//! - **scheduler**: Fixed-interval pipeline loop with shutdown support
//! - **model**: Linear speed model training, artifacts, and inference
//! - **server**: Model-serving HTTP endpoint
//!
//! # Example
//!
//! ```no_run
//! use urban_pulse::config::Config;
//! use urban_pulse::http::build_client;
//! use urban_pulse::predict::Predictor;
//! use urban_pulse::scheduler::Scheduler;
//! use urban_pulse::sink::BackendSink;
//! use urban_pulse::sources::TrafficSource;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Load configuration from environment
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     // One pooled client shared by the pipeline's outbound calls
//!     let client = build_client(config.request_timeout).expect("Failed to create client");
//!
//!     let traffic = TrafficSource::new();
//!     let predictor = Predictor::new(client.clone(), &config);
//!     let sink = BackendSink::new(client, &config);
//!
//!     // Run a single pipeline cycle
//!     let mut scheduler = Scheduler::new(traffic, predictor, sink, &config);
//!     let report = scheduler.run_tick().await;
//!     println!("delivered {} rows", report.rows);
//! }
//! ```

use tracing_subscriber::EnvFilter;

// Module declarations
pub mod config;
pub mod http;
pub mod model;
pub mod predict;
pub mod reading;
pub mod scheduler;
pub mod server;
pub mod sink;
pub mod sources;

// Re-export commonly used types at crate root for convenience
pub use config::{Config, ConfigError};
pub use http::{build_client, HttpError, RetryClient};
pub use model::{ModelError, TrafficModel, MODEL_FEATURES};
pub use predict::{Predictor, SCHEDULER_FALLBACK_SPEED_KMH};
pub use reading::{
    Batch, EnrichedBatch, EnrichedReading, PollutionReading, PredictRequest, PredictResponse,
    PredictionOrigin, Reading, WeatherReading,
};
pub use scheduler::{PipelineStats, Scheduler, TickReport};
pub use server::{app, AppState, SERVER_FALLBACK_SPEED_KMH};
pub use sink::{BackendSink, SinkOutcome};
pub use sources::{PollutionSource, TrafficSource, WeatherSource};

/// Initialize the tracing subscriber shared by the service binaries.
///
/// Filtering follows `RUST_LOG` when set and defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}
