//! HTTP endpoint serving speed predictions and environmental pass-throughs.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use crate::model::TrafficModel;
use crate::reading::{PollutionReading, PredictRequest, PredictResponse, WeatherReading};
use crate::sources::{PollutionSource, WeatherSource};

/// Speed served when no model artifact is loaded.
///
/// A deliberately neutral city speed, so consumers keep getting usable
/// responses while the model is missing or being retrained.
pub const SERVER_FALLBACK_SPEED_KMH: f64 = 25.0;

/// Shared state behind the endpoint: the model (if one loaded) and the
/// environmental sources served as pass-throughs.
pub struct AppState {
    model: Option<TrafficModel>,
    weather: WeatherSource,
    pollution: PollutionSource,
}

impl AppState {
    pub fn new(
        model: Option<TrafficModel>,
        weather: WeatherSource,
        pollution: PollutionSource,
    ) -> Self {
        Self {
            model,
            weather,
            pollution,
        }
    }

    /// Whether a model artifact is loaded and serving predictions.
    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }
}

/// Build the router for the model server.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/weather", get(weather))
        .route("/pollution", get(pollution))
        .route("/health", get(health))
        .with_state(state)
}

/// POST /predict: score one reading.
///
/// Always answers 200 with a speed; without a loaded model the fallback is
/// served instead of an error.
async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Json<PredictResponse> {
    let predicted_speed = match &state.model {
        Some(model) => {
            let speed = model.predict(request.latitude, request.longitude, request.hour);
            info!(
                latitude = request.latitude,
                longitude = request.longitude,
                hour = request.hour,
                speed_kmh = speed,
                "prediction served"
            );
            speed
        }
        None => {
            warn!(
                fallback_kmh = SERVER_FALLBACK_SPEED_KMH,
                "model not loaded, serving fallback speed"
            );
            SERVER_FALLBACK_SPEED_KMH
        }
    };

    Json(PredictResponse { predicted_speed })
}

/// GET /weather: current hourly temperature prefix, empty on upstream
/// failure.
async fn weather(State(state): State<Arc<AppState>>) -> Json<Vec<WeatherReading>> {
    Json(state.weather.fetch().await)
}

/// GET /pollution: one simulated sample per pollutant.
async fn pollution(State(state): State<Arc<AppState>>) -> Json<Vec<PollutionReading>> {
    Json(state.pollution.sample())
}

/// GET /health: liveness plus whether a model is loaded.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": state.model_loaded(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
