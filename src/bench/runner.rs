//! Benchmark runner
//!
//! Runs sequential load-test rounds against a stored profile, averages the
//! results, scores them and appends the record to the benchmark log. The
//! active profile and subsystem configuration are never touched.

use super::database::{queries_per_second, DatabaseWorkload};
use super::load::{LoadGenerator, LoadResult};
use crate::error::{Result, TuneError};
use crate::profile::ProfileStore;
use crate::progress::ProgressReporter;
use crate::system::{HardwareProfile, MetricSource, SystemSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Endpoint the load generator targets
    pub url: String,
    /// Requests per round
    pub requests: u32,
    /// Requests in flight
    pub concurrency: u32,
    /// Pause between rounds in seconds
    pub pause_secs: u64,
    /// Database workload iterations per round
    pub db_iterations: u64,
    /// Rounds used when none are requested
    pub rounds: u32,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/".to_string(),
            requests: 1000,
            concurrency: 10,
            pause_secs: 10,
            db_iterations: 1_000_000,
            rounds: 3,
        }
    }
}

impl BenchmarkConfig {
    /// Pause between rounds
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

/// Measurements of one round
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    /// Round number, starting at 1
    pub round: u32,
    /// Requests per second reported by the load tool
    pub web_requests_per_second: f64,
    /// Mean time per request in milliseconds
    pub web_response_time_ms: f64,
    /// Database workload throughput
    pub database_queries_per_second: f64,
    /// CPU usage after the round
    pub cpu_usage_percent: f64,
    /// Memory usage after the round
    pub memory_usage_percent: f64,
    /// One-minute load average after the round
    pub load_average: f64,
    /// Whether the load tool produced a result this round
    pub load_tool_available: bool,
    /// Whether the database workload ran this round
    pub database_available: bool,
}

/// Arithmetic means over all rounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    /// Mean requests per second
    pub web_requests_per_second: f64,
    /// Mean response time in milliseconds
    pub web_response_time_ms: f64,
    /// Mean database queries per second
    pub database_queries_per_second: f64,
}

impl Averages {
    /// Average a set of rounds; all zeros when empty
    pub fn of(runs: &[RunSample]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }
        let n = runs.len() as f64;
        Self {
            web_requests_per_second: runs.iter().map(|r| r.web_requests_per_second).sum::<f64>() / n,
            web_response_time_ms: runs.iter().map(|r| r.web_response_time_ms).sum::<f64>() / n,
            database_queries_per_second: runs
                .iter()
                .map(|r| r.database_queries_per_second)
                .sum::<f64>()
                / n,
        }
    }

    /// `floor((rps + qps) / response_time)`, or 0 without a response time
    pub fn performance_score(&self) -> u64 {
        if self.web_response_time_ms <= 0.0 {
            tracing::warn!("Average response time is zero, performance score set to 0");
            return 0;
        }
        let score =
            (self.web_requests_per_second + self.database_queries_per_second) / self.web_response_time_ms;
        score.floor() as u64
    }
}

/// Persisted outcome of a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Profile that was benchmarked
    pub profile_name: String,
    /// Hardware the profile was generated for
    pub hardware_basis: HardwareProfile,
    /// Host the run executed on
    pub hostname: String,
    /// When the first round started
    pub started_at: DateTime<Utc>,
    /// When the last round finished
    pub finished_at: DateTime<Utc>,
    /// Per-round measurements
    pub runs: Vec<RunSample>,
    /// Means over `runs`
    pub averages: Averages,
    /// Score derived from `averages`
    pub performance_score: u64,
}

impl BenchmarkResult {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Benchmark: {} ===", self.profile_name);
        println!("Host:              {}", self.hostname);
        println!("Started:           {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!(
            "Duration:          {:.1?}",
            (self.finished_at - self.started_at).to_std().unwrap_or_default()
        );
        println!(
            "{:>5} {:>12} {:>10} {:>14} {:>6} {:>6} {:>6}",
            "ROUND", "REQ/S", "RT (ms)", "QUERIES/S", "CPU%", "MEM%", "LOAD"
        );
        for run in &self.runs {
            println!(
                "{:>5} {:>12.2} {:>10.2} {:>14.0} {:>6.1} {:>6.1} {:>6.2}{}",
                run.round,
                run.web_requests_per_second,
                run.web_response_time_ms,
                run.database_queries_per_second,
                run.cpu_usage_percent,
                run.memory_usage_percent,
                run.load_average,
                match (run.load_tool_available, run.database_available) {
                    (true, true) => "",
                    (false, true) => "  (no load tool)",
                    (true, false) => "  (no database)",
                    (false, false) => "  (no load tool, no database)",
                }
            );
        }
        println!("Average req/s:     {:.2}", self.averages.web_requests_per_second);
        println!("Average RT:        {:.2} ms", self.averages.web_response_time_ms);
        println!("Average queries/s: {:.0}", self.averages.database_queries_per_second);
        println!("Score:             {}", self.performance_score);
    }
}

/// Executes benchmark runs against stored profiles
pub struct BenchmarkRunner {
    store: Arc<ProfileStore>,
    load: Box<dyn LoadGenerator>,
    database: Box<dyn DatabaseWorkload>,
    metrics: Arc<dyn MetricSource>,
    config: BenchmarkConfig,
    progress: ProgressReporter,
}

impl BenchmarkRunner {
    /// Create a runner with progress display disabled
    pub fn new(
        store: Arc<ProfileStore>,
        load: Box<dyn LoadGenerator>,
        database: Box<dyn DatabaseWorkload>,
        metrics: Arc<dyn MetricSource>,
        config: BenchmarkConfig,
    ) -> Self {
        Self {
            store,
            load,
            database,
            metrics,
            config,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Show progress while running
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Benchmark a stored profile over `rounds` sequential rounds
    pub fn run(&self, profile_name: &str, rounds: u32) -> Result<BenchmarkResult> {
        if rounds == 0 {
            return Err(TuneError::InvalidArgument(
                "benchmark rounds must be at least 1".to_string(),
            ));
        }
        let profile = self.store.load(profile_name)?;

        tracing::info!(profile = profile_name, rounds, url = %self.config.url, "Starting benchmark");
        self.progress.set_total_rounds(rounds as u64);

        let started_at = Utc::now();
        let mut runs = Vec::with_capacity(rounds as usize);
        for round in 1..=rounds {
            runs.push(self.run_round(round));
            self.progress.finish_round();

            if round < rounds && !self.config.pause().is_zero() {
                self.progress.set_pausing(self.config.pause());
                std::thread::sleep(self.config.pause());
            }
        }

        let averages = Averages::of(&runs);
        let result = BenchmarkResult {
            profile_name: profile.name,
            hardware_basis: profile.hardware_basis,
            hostname: local_hostname(),
            started_at,
            finished_at: Utc::now(),
            performance_score: averages.performance_score(),
            averages,
            runs,
        };

        if let Err(e) = self.store.append_benchmark(&result) {
            self.progress.finish_error("Failed to record benchmark");
            return Err(e);
        }
        self.progress.finish_success(&format!("Score {}", result.performance_score));

        tracing::info!(
            profile = profile_name,
            score = result.performance_score,
            rps = result.averages.web_requests_per_second,
            "Benchmark complete"
        );
        Ok(result)
    }

    fn run_round(&self, round: u32) -> RunSample {
        self.progress.set_status(&format!("Round {}: HTTP load test", round));
        let (load, load_tool_available) = match self.load.run(
            &self.config.url,
            self.config.requests,
            self.config.concurrency,
        ) {
            Ok(result) => (result, true),
            Err(e) => {
                tracing::warn!(round, "Load test unavailable, recording zeros: {}", e);
                (LoadResult::default(), false)
            }
        };

        self.progress.set_status(&format!("Round {}: database workload", round));
        let (database_queries_per_second, database_available) =
            match self.database.run(self.config.db_iterations) {
                Ok(elapsed) => (queries_per_second(self.config.db_iterations, elapsed), true),
                Err(e) => {
                    tracing::warn!(round, "Database workload unavailable, recording zero: {}", e);
                    (0.0, false)
                }
            };

        let system = self.metrics.sample().unwrap_or_else(|e| {
            tracing::warn!(round, "System metrics unavailable: {}", e);
            SystemSample::default()
        });

        let sample = RunSample {
            round,
            web_requests_per_second: load.requests_per_second,
            web_response_time_ms: load.mean_response_time_ms,
            database_queries_per_second,
            cpu_usage_percent: system.cpu_usage_percent,
            memory_usage_percent: system.memory_usage_percent,
            load_average: system.load_average,
            load_tool_available,
            database_available,
        };
        tracing::debug!(?sample, "Round complete");
        sample
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
