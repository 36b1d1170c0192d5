//! Urban Pulse - scheduled telemetry pipeline service
//!
//! This service fetches simulated traffic readings on a fixed cadence,
//! enriches each reading with a model speed prediction, and forwards the
//! batch to the backend ingest endpoint.
//!
//! ## Features
//!
//! - Fixed-interval pipeline cycles with an immediate first run
//! - Per-reading prediction calls with a recorded fallback on failure
//! - Batch delivery that skips empty cycles
//! - Graceful shutdown on SIGINT, abandoning any cycle in flight
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `URBAN_PULSE_PREDICT_URL`: Prediction endpoint (default: http://127.0.0.1:9000/predict)
//! - `URBAN_PULSE_BACKEND_URL`: Backend ingest endpoint (default: http://localhost:8081/api/predictions)
//! - `URBAN_PULSE_INTERVAL_MINUTES`: Minutes between cycles (default: 30)
//! - `URBAN_PULSE_ROWS_PER_TICK`: Traffic readings per cycle (default: 5)
//! - `URBAN_PULSE_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: 10)
//! - `RUST_LOG`: Logging level filter (default: info)

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use urban_pulse::config::Config;
use urban_pulse::http::build_client;
use urban_pulse::predict::Predictor;
use urban_pulse::scheduler::Scheduler;
use urban_pulse::sink::BackendSink;
use urban_pulse::sources::TrafficSource;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    urban_pulse::init_tracing();

    info!("Starting Urban Pulse pipeline service...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                predict_url = %config.predict_url,
                backend_url = %config.backend_url,
                interval_mins = config.interval.as_secs() / 60,
                rows_per_tick = config.rows_per_tick,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // One pooled HTTP client shared by prediction and delivery calls
    let client = match build_client(config.request_timeout) {
        Ok(client) => {
            info!("HTTP client initialized");
            client
        }
        Err(e) => {
            error!(error = %e, "Failed to create HTTP client");
            std::process::exit(1);
        }
    };

    let traffic = TrafficSource::new();
    let predictor = Predictor::new(client.clone(), &config);
    let sink = BackendSink::new(client, &config);
    let scheduler = Scheduler::new(traffic, predictor, sink, &config);

    // Spawn the scheduler task with a shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // Wait for shutdown signal
    info!("Urban Pulse running. Press Ctrl+C to stop.");
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping...");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown...");

    if shutdown_tx.send(true).is_err() {
        warn!("Scheduler task already stopped");
    }

    // Wait for the scheduler to wind down (with timeout)
    let shutdown_timeout = Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, scheduler_handle).await {
        Ok(Ok(stats)) => {
            info!(
                ticks = stats.ticks_completed,
                rows_fetched = stats.rows_fetched,
                rows_predicted = stats.rows_predicted,
                fallbacks = stats.prediction_fallbacks,
                batches_sent = stats.batches_sent,
                batches_skipped = stats.batches_skipped_empty,
                rejected = stats.send_rejected,
                failed = stats.send_failed,
                "Scheduler shut down gracefully"
            );
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Scheduler task panicked during shutdown");
        }
        Err(_) => {
            warn!("Scheduler shutdown timed out after {:?}", shutdown_timeout);
        }
    }

    info!("Urban Pulse stopped");
}
