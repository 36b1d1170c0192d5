//! Delivery of enriched batches to the downstream backend.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::reading::EnrichedBatch;

/// What happened to one delivery attempt.
///
/// Delivery never returns an error to the caller; every failure mode is an
/// outcome the scheduler records and moves past.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOutcome {
    /// The backend accepted the batch.
    Sent { rows: usize },
    /// The batch was empty, so no request was made.
    SkippedEmpty,
    /// The backend answered with a non-OK status.
    Rejected { status: StatusCode, body: String },
    /// The request never completed (connect failure, timeout, ...).
    TransportFailed { error: String },
}

impl SinkOutcome {
    /// Whether the batch reached the backend and was accepted.
    pub fn is_sent(&self) -> bool {
        matches!(self, SinkOutcome::Sent { .. })
    }
}

/// Client that posts enriched batches to the backend ingest endpoint.
pub struct BackendSink {
    client: Client,
    backend_url: String,
    timeout: Duration,
}

impl BackendSink {
    /// Create a sink from the service configuration.
    pub fn new(client: Client, config: &Config) -> Self {
        Self::with_settings(client, config.backend_url.clone(), config.request_timeout)
    }

    /// Create a sink with explicit settings.
    pub fn with_settings(client: Client, backend_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            backend_url: backend_url.into(),
            timeout,
        }
    }

    /// Get the configured backend endpoint URL.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Send a batch to the backend as one JSON array POST.
    ///
    /// An empty batch is skipped without touching the network. Only an HTTP
    /// 200 counts as accepted; anything else is logged and reported through
    /// the returned [`SinkOutcome`].
    pub async fn send(&self, batch: &EnrichedBatch) -> SinkOutcome {
        if batch.is_empty() {
            warn!(tick_id = %batch.tick_id, "no data to send, skipping backend call");
            return SinkOutcome::SkippedEmpty;
        }

        info!(
            tick_id = %batch.tick_id,
            rows = batch.len(),
            url = %self.backend_url,
            "sending enriched batch to backend"
        );

        let result = self
            .client
            .post(&self.backend_url)
            .timeout(self.timeout)
            .json(batch.rows())
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::OK {
                    info!(
                        tick_id = %batch.tick_id,
                        rows = batch.len(),
                        "batch accepted by backend"
                    );
                    SinkOutcome::Sent { rows: batch.len() }
                } else {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    warn!(
                        tick_id = %batch.tick_id,
                        status = %status,
                        body = %body,
                        "backend rejected batch"
                    );
                    SinkOutcome::Rejected { status, body }
                }
            }
            Err(e) => {
                error!(
                    tick_id = %batch.tick_id,
                    error = %e,
                    "failed to send batch to backend"
                );
                SinkOutcome::TransportFailed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use crate::reading::{EnrichedReading, Reading};
    use uuid::Uuid;

    fn test_sink(url: &str) -> BackendSink {
        let client = build_client(Duration::from_secs(1)).unwrap();
        BackendSink::with_settings(client, url, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        // The URL is unroutable on purpose; an empty batch must never get
        // as far as a connection attempt.
        let sink = test_sink("http://127.0.0.1:1/api/predictions");
        let batch = EnrichedBatch::new(Uuid::new_v4(), Vec::new());

        let outcome = sink.send(&batch).await;
        assert_eq!(outcome, SinkOutcome::SkippedEmpty);
    }

    #[tokio::test]
    async fn test_unreachable_backend_reports_transport_failure() {
        let sink = test_sink("http://127.0.0.1:1/api/predictions");
        let rows = vec![EnrichedReading::predicted(Reading::new(12.97, 77.59, 8), 31.5)];
        let batch = EnrichedBatch::new(Uuid::new_v4(), rows);

        let outcome = sink.send(&batch).await;
        match outcome {
            SinkOutcome::TransportFailed { error } => assert!(!error.is_empty()),
            other => panic!("expected transport failure, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_is_sent() {
        assert!(SinkOutcome::Sent { rows: 5 }.is_sent());
        assert!(!SinkOutcome::SkippedEmpty.is_sent());
        assert!(!SinkOutcome::TransportFailed { error: "refused".into() }.is_sent());
    }

    #[test]
    fn test_sink_from_config() {
        let config = Config::default();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let sink = BackendSink::new(client, &config);

        assert_eq!(sink.backend_url(), config.backend_url);
    }
}
