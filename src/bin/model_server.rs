//! Model server - HTTP endpoint for speed predictions and environmental data
//!
//! Serves the trained traffic speed model over `POST /predict`, with
//! weather and pollution pass-throughs and a health probe. A missing or
//! unreadable model artifact is not fatal: the server starts anyway and
//! answers predictions with a fixed fallback speed until an artifact is
//! trained and the process restarted.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use urban_pulse::config::Config;
use urban_pulse::http::RetryClient;
use urban_pulse::model::TrafficModel;
use urban_pulse::server::{app, AppState, SERVER_FALLBACK_SPEED_KMH};
use urban_pulse::sources::{PollutionSource, WeatherSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    urban_pulse::init_tracing();

    info!("Starting Urban Pulse model server...");

    let config = Config::from_env().context("failed to load configuration")?;

    // Degrade to fallback serving when the artifact is absent or unreadable.
    let model = match TrafficModel::load(&config.model_path) {
        Ok(model) => {
            info!(
                path = %config.model_path,
                trained_at = %model.trained_at(),
                "Model loaded"
            );
            Some(model)
        }
        Err(e) => {
            warn!(
                path = %config.model_path,
                error = %e,
                fallback_kmh = SERVER_FALLBACK_SPEED_KMH,
                "Model not available, serving fallback predictions"
            );
            None
        }
    };

    let retry_client = RetryClient::new(&config).context("failed to create HTTP client")?;
    info!(
        weather_url = %config.weather_url,
        max_retries = retry_client.max_retries(),
        "Weather source initialized"
    );
    let weather = WeatherSource::new(retry_client, &config);
    let pollution = PollutionSource::new();

    let state = Arc::new(AppState::new(model, weather, pollution));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Model server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Model server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received, stopping...");
    }
}
