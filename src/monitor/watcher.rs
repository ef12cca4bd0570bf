//! Monitoring loop
//!
//! A background thread samples host metrics and endpoint latency on a fixed
//! interval and logs every threshold breach. Breaches are advisory: nothing
//! is changed on the host.

use super::thresholds::{evaluate, MonitorSample, Thresholds};
use crate::error::{Result, TuneError};
use crate::profile::ProfileStore;
use crate::system::{LatencyProbe, MetricSource};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default sampling interval
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Counters returned when monitoring stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    /// Samples taken
    pub ticks: u64,
    /// Breach records emitted
    pub breaches: u64,
}

impl MonitorSummary {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Monitor Summary ===");
        println!("Samples:  {}", self.ticks);
        println!("Breaches: {}", self.breaches);
    }
}

/// Samples metrics and reports threshold breaches
pub struct Monitor {
    store: Arc<ProfileStore>,
    metrics: Arc<dyn MetricSource>,
    probe: Arc<dyn LatencyProbe>,
    url: String,
    thresholds: Thresholds,
}

impl Monitor {
    /// Create a monitor for the endpoint at `url`
    pub fn new(
        store: Arc<ProfileStore>,
        metrics: Arc<dyn MetricSource>,
        probe: Arc<dyn LatencyProbe>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            metrics,
            probe,
            url: url.into(),
            thresholds: Thresholds::default(),
        }
    }

    /// Override the default thresholds
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Start sampling every `interval` on a background thread
    ///
    /// Fails with [`TuneError::InvalidArgument`] for a zero interval.
    pub fn start(self, interval: Duration) -> Result<MonitorHandle> {
        if interval.is_zero() {
            return Err(TuneError::InvalidArgument(
                "monitor interval must be greater than zero".to_string(),
            ));
        }
        let (stop_tx, stop_rx) = channel::bounded(1);

        tracing::info!(
            url = %self.url,
            interval = %humantime::format_duration(interval),
            "Monitoring started"
        );
        let thread = thread::Builder::new()
            .name("hwtune-monitor".to_string())
            .spawn(move || self.run(interval, stop_rx))?;

        Ok(MonitorHandle { stop_tx, thread })
    }

    fn run(self, interval: Duration, stop_rx: Receiver<()>) -> MonitorSummary {
        let ticker = channel::tick(interval);
        let mut summary = MonitorSummary::default();

        loop {
            crossbeam::select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    // A stop that raced with this tick wins
                    match stop_rx.try_recv() {
                        Ok(()) | Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }
                    summary.breaches += self.tick();
                    summary.ticks += 1;
                }
            }
        }

        tracing::info!(ticks = summary.ticks, breaches = summary.breaches, "Monitoring stopped");
        summary
    }

    /// Take one sample and log its breaches, returning how many there were
    fn tick(&self) -> u64 {
        let sample = self.sample();
        tracing::debug!(?sample, "Monitor sample");

        let breaches = evaluate(&sample, &self.thresholds);
        if breaches.is_empty() {
            return 0;
        }

        let profile = match self.store.get_active() {
            Ok(Some(name)) => name,
            Ok(None) => "none".to_string(),
            Err(e) => {
                tracing::debug!("Could not read active profile: {}", e);
                "unknown".to_string()
            }
        };

        for breach in &breaches {
            tracing::warn!(
                metric = %breach.metric,
                value = breach.value,
                threshold = breach.threshold,
                hint = breach.hint,
                profile = %profile,
                "Threshold exceeded"
            );
        }
        breaches.len() as u64
    }

    fn sample(&self) -> MonitorSample {
        let system = self
            .metrics
            .sample()
            .map_err(|e| tracing::warn!("System metrics unavailable: {}", e))
            .ok();
        let response_time_ms = self
            .probe
            .response_time_ms(&self.url)
            .map_err(|e| tracing::warn!(url = %self.url, "Latency probe failed: {}", e))
            .ok();

        MonitorSample {
            cpu_usage_percent: system.map(|s| s.cpu_usage_percent),
            memory_usage_percent: system.map(|s| s.memory_usage_percent),
            response_time_ms,
        }
    }
}

/// Handle to a running monitor
pub struct MonitorHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<MonitorSummary>,
}

impl MonitorHandle {
    /// Stop sampling and wait for the loop to exit
    ///
    /// A sample already in progress completes; no new sample starts.
    pub fn stop(self) -> MonitorSummary {
        let _ = self.stop_tx.try_send(());
        self.join()
    }

    /// Wait for the loop without signalling it to stop
    pub fn wait(self) -> MonitorSummary {
        self.join()
    }

    fn join(self) -> MonitorSummary {
        self.thread.join().unwrap_or_else(|_| {
            tracing::error!("Monitor thread panicked");
            MonitorSummary::default()
        })
    }
}
