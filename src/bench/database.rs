//! Database workload
//!
//! A fixed CPU-bound query timed end to end. The runner converts elapsed
//! time to queries per second.

use crate::error::{Result, TuneError};
use crate::system::command::{failure_message, run_command, which};
use std::time::{Duration, Instant};

/// Executes a repeatable database workload
pub trait DatabaseWorkload: Send + Sync {
    /// Run `iterations` evaluations and return the elapsed wall time
    ///
    /// Fails with [`TuneError::DatabaseUnavailable`] if the database cannot
    /// be reached.
    fn run(&self, iterations: u64) -> Result<Duration>;
}

/// [`DatabaseWorkload`] using the `mysql` client and `BENCHMARK()`
#[derive(Debug, Clone)]
pub struct MysqlWorkload {
    program: String,
    extra_args: Vec<String>,
}

impl MysqlWorkload {
    /// Use `mysql` from `PATH` with default credentials
    pub fn new() -> Self {
        Self {
            program: "mysql".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Pass extra client arguments (e.g. `--defaults-extra-file=...`)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Query evaluated by the workload
    pub fn query(iterations: u64) -> String {
        format!("SELECT BENCHMARK({}, MD5('hwtune'))", iterations)
    }
}

impl Default for MysqlWorkload {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseWorkload for MysqlWorkload {
    fn run(&self, iterations: u64) -> Result<Duration> {
        if which(&self.program).is_none() {
            return Err(TuneError::DatabaseUnavailable(format!(
                "'{}' not found in PATH",
                self.program
            )));
        }

        let query = Self::query(iterations);
        let mut args: Vec<&str> = self.extra_args.iter().map(String::as_str).collect();
        args.extend(["--batch", "--skip-column-names", "-e", query.as_str()]);

        let start = Instant::now();
        let output = run_command(&self.program, &args)
            .map_err(|e| TuneError::DatabaseUnavailable(e.to_string()))?;
        let elapsed = start.elapsed();

        if !output.status.success() {
            return Err(TuneError::DatabaseUnavailable(failure_message(&output)));
        }

        tracing::debug!(iterations, elapsed = ?elapsed, "Database workload finished");
        Ok(elapsed)
    }
}

/// Queries per second for a timed workload; zero for a zero duration
pub fn queries_per_second(iterations: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        iterations as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text() {
        assert_eq!(
            MysqlWorkload::query(1_000_000),
            "SELECT BENCHMARK(1000000, MD5('hwtune'))"
        );
    }

    #[test]
    fn test_queries_per_second() {
        assert_eq!(queries_per_second(1_000_000, Duration::from_millis(500)), 2_000_000.0);
        assert_eq!(queries_per_second(1_000, Duration::ZERO), 0.0);
    }
}
