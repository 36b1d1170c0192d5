//! Fixed-interval pipeline scheduler: fetch, enrich, deliver, repeat.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::predict::Predictor;
use crate::sink::{BackendSink, SinkOutcome};
use crate::sources::TrafficSource;

/// Counters accumulated across the life of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks_completed: u64,
    pub rows_fetched: u64,
    pub rows_predicted: u64,
    pub prediction_fallbacks: u64,
    pub batches_sent: u64,
    pub batches_skipped_empty: u64,
    pub send_rejected: u64,
    pub send_failed: u64,
}

/// Summary of one completed pipeline cycle.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick_id: Uuid,
    pub rows: usize,
    pub fallbacks: usize,
    pub outcome: SinkOutcome,
    pub elapsed: Duration,
}

/// Drives the pipeline on a fixed cadence.
///
/// The first cycle runs immediately on start; later cycles follow the
/// configured interval. Cycles never overlap: a cycle that outlasts the
/// interval is logged as an overrun and the missed firings are skipped, so
/// the next cycle starts at the next interval boundary.
pub struct Scheduler {
    traffic: TrafficSource,
    predictor: Predictor,
    sink: BackendSink,
    interval: Duration,
    rows_per_tick: usize,
    stats: PipelineStats,
}

impl Scheduler {
    pub fn new(
        traffic: TrafficSource,
        predictor: Predictor,
        sink: BackendSink,
        config: &Config,
    ) -> Self {
        Self {
            traffic,
            predictor,
            sink,
            interval: config.interval,
            rows_per_tick: config.rows_per_tick,
            stats: PipelineStats::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run the scheduler until `shutdown` signals or its sender is dropped.
    ///
    /// A shutdown that arrives mid-cycle abandons the cycle in flight.
    /// Returns the final counters.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        info!(
            interval_secs = self.interval.as_secs(),
            rows_per_tick = self.rows_per_tick,
            "scheduler started"
        );

        // First cycle fires immediately, before the timer exists.
        tokio::select! {
            _ = shutdown.changed() => {
                info!("shutdown before first cycle");
                return self.stats;
            }
            _ = self.run_tick() => {}
        }

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The timer's first tick completes at once; consume it so the next
        // cycle waits a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown signal received, scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown signal received, abandoning cycle in flight");
                    break;
                }
                _ = self.run_tick() => {}
            }
        }

        self.stats
    }

    /// Run one full pipeline cycle and record it in the counters.
    pub async fn run_tick(&mut self) -> TickReport {
        let started = Instant::now();

        let batch = self.traffic.fetch(self.rows_per_tick);
        let tick_id = batch.tick_id;

        let enriched = self.predictor.enrich(batch).await;
        let outcome = self.sink.send(&enriched).await;

        let report = TickReport {
            tick_id,
            rows: enriched.len(),
            fallbacks: enriched.fallback_count(),
            outcome,
            elapsed: started.elapsed(),
        };
        self.record(&report);
        report
    }

    fn record(&mut self, report: &TickReport) {
        self.stats.ticks_completed += 1;
        self.stats.rows_fetched += report.rows as u64;
        self.stats.rows_predicted += (report.rows - report.fallbacks) as u64;
        self.stats.prediction_fallbacks += report.fallbacks as u64;

        match &report.outcome {
            SinkOutcome::Sent { .. } => self.stats.batches_sent += 1,
            SinkOutcome::SkippedEmpty => self.stats.batches_skipped_empty += 1,
            SinkOutcome::Rejected { .. } => self.stats.send_rejected += 1,
            SinkOutcome::TransportFailed { .. } => self.stats.send_failed += 1,
        }

        info!(
            tick_id = %report.tick_id,
            rows = report.rows,
            fallbacks = report.fallbacks,
            outcome = ?report.outcome,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cycle completed"
        );

        if report.elapsed > self.interval {
            warn!(
                tick_id = %report.tick_id,
                elapsed_ms = report.elapsed.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "cycle overran the scheduling interval, skipping missed firings"
            );
        }
    }
}
