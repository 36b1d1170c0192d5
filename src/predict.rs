//! Per-row prediction client for the traffic speed model endpoint.

use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::http::HttpError;
use crate::reading::{Batch, EnrichedBatch, EnrichedReading, PredictRequest, PredictResponse, Reading};

/// Speed recorded for a row whose prediction call failed.
///
/// Deliberately distinct from the model server's own fallback: a zero in the
/// backend marks a row the pipeline could not score, not a served prediction.
pub const SCHEDULER_FALLBACK_SPEED_KMH: f64 = 0.0;

/// Client for the prediction endpoint, called once per reading.
///
/// Each call is a single attempt. A failed row is recorded with
/// [`SCHEDULER_FALLBACK_SPEED_KMH`] instead of being retried or dropped, so a batch
/// always leaves enrichment with the same rows it entered with.
pub struct Predictor {
    client: Client,
    predict_url: String,
    timeout: Duration,
}

impl Predictor {
    /// Create a predictor from the service configuration.
    pub fn new(client: Client, config: &Config) -> Self {
        Self::with_settings(client, config.predict_url.clone(), config.request_timeout)
    }

    /// Create a predictor with explicit settings.
    pub fn with_settings(client: Client, predict_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            predict_url: predict_url.into(),
            timeout,
        }
    }

    /// Get the configured prediction endpoint URL.
    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }

    /// Request a speed prediction for a single reading.
    pub async fn predict_one(&self, reading: &Reading) -> Result<f64, HttpError> {
        let request = PredictRequest::from(reading);

        let response = self
            .client
            .post(&self.predict_url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(HttpError::Status {
                code: status,
                message,
            });
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| HttpError::Parse(format!("invalid prediction response: {}", e)))?;
        Ok(parsed.predicted_speed)
    }

    /// Attach a predicted speed to every reading in the batch, in order.
    ///
    /// Rows whose prediction call fails are kept with the fallback speed, so
    /// the returned batch always has `batch.len()` rows.
    pub async fn enrich(&self, batch: Batch) -> EnrichedBatch {
        let tick_id = batch.tick_id;
        let mut rows = Vec::with_capacity(batch.len());

        for reading in batch.readings() {
            match self.predict_one(reading).await {
                Ok(speed) => {
                    info!(
                        tick_id = %tick_id,
                        hour = reading.hour,
                        speed_kmh = speed,
                        "predicted traffic speed"
                    );
                    rows.push(EnrichedReading::predicted(*reading, speed));
                }
                Err(HttpError::Status { code, message }) => {
                    warn!(
                        tick_id = %tick_id,
                        status = %code,
                        message = %message,
                        fallback_kmh = SCHEDULER_FALLBACK_SPEED_KMH,
                        "prediction endpoint rejected reading, using fallback"
                    );
                    rows.push(EnrichedReading::fallback(*reading, SCHEDULER_FALLBACK_SPEED_KMH));
                }
                Err(e) => {
                    error!(
                        tick_id = %tick_id,
                        error = %e,
                        fallback_kmh = SCHEDULER_FALLBACK_SPEED_KMH,
                        "prediction call failed, using fallback"
                    );
                    rows.push(EnrichedReading::fallback(*reading, SCHEDULER_FALLBACK_SPEED_KMH));
                }
            }
        }

        EnrichedBatch::new(tick_id, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;

    fn test_client() -> Client {
        build_client(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_predictor_from_config() {
        let config = Config::default();
        let predictor = Predictor::new(test_client(), &config);

        assert_eq!(predictor.predict_url(), config.predict_url);
    }

    #[test]
    fn test_predictor_with_settings() {
        let predictor = Predictor::with_settings(
            test_client(),
            "http://localhost:9999/predict",
            Duration::from_secs(5),
        );

        assert_eq!(predictor.predict_url(), "http://localhost:9999/predict");
    }

    #[tokio::test]
    async fn test_enrich_keeps_rows_when_endpoint_unreachable() {
        // Nothing listens on this port, so every prediction call fails fast
        // with a connection error and the row falls back.
        let predictor = Predictor::with_settings(
            test_client(),
            "http://127.0.0.1:1/predict",
            Duration::from_secs(1),
        );

        let readings = vec![
            Reading::new(12.971, 77.591, 8),
            Reading::new(12.972, 77.592, 9),
            Reading::new(12.973, 77.593, 10),
        ];
        let batch = Batch::new(readings.clone());
        let tick_id = batch.tick_id;

        let enriched = predictor.enrich(batch).await;

        assert_eq!(enriched.tick_id, tick_id);
        assert_eq!(enriched.len(), readings.len());
        assert_eq!(enriched.fallback_count(), readings.len());
        for (row, original) in enriched.rows().iter().zip(readings.iter()) {
            assert_eq!(row.reading, *original);
            assert_eq!(row.predicted_speed, SCHEDULER_FALLBACK_SPEED_KMH);
        }
    }

    #[tokio::test]
    async fn test_enrich_empty_batch() {
        let predictor = Predictor::with_settings(
            test_client(),
            "http://127.0.0.1:1/predict",
            Duration::from_secs(1),
        );

        let enriched = predictor.enrich(Batch::empty()).await;
        assert!(enriched.is_empty());
        assert_eq!(enriched.fallback_count(), 0);
    }
}
