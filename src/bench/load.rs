//! HTTP load generation
//!
//! The runner only sees [`LoadGenerator`]; output parsing for the
//! ApacheBench tool stays in this file.

use crate::error::{Result, TuneError};
use crate::system::command::{failure_message, run_command, which};
use serde::{Deserialize, Serialize};

/// Outcome of one load test
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    /// Requests served per second
    pub requests_per_second: f64,
    /// Mean time per request in milliseconds
    pub mean_response_time_ms: f64,
}

/// Generates HTTP load against an endpoint
pub trait LoadGenerator: Send + Sync {
    /// Issue `requests` requests with `concurrency` in flight
    ///
    /// Fails with [`TuneError::LoadToolUnavailable`] if the tool is missing
    /// or produced no usable result.
    fn run(&self, url: &str, requests: u32, concurrency: u32) -> Result<LoadResult>;
}

/// [`LoadGenerator`] that shells out to ApacheBench (`ab`)
#[derive(Debug, Clone)]
pub struct ApacheBench {
    program: String,
}

impl ApacheBench {
    /// Use `ab` from `PATH`
    pub fn new() -> Self {
        Self::with_program("ab")
    }

    /// Use a specific executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ApacheBench {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGenerator for ApacheBench {
    fn run(&self, url: &str, requests: u32, concurrency: u32) -> Result<LoadResult> {
        if !self.program.contains('/') && which(&self.program).is_none() {
            return Err(TuneError::LoadToolUnavailable(format!(
                "'{}' not found in PATH",
                self.program
            )));
        }

        let requests = requests.to_string();
        let concurrency = concurrency.to_string();
        let args = ["-n", requests.as_str(), "-c", concurrency.as_str(), url];
        let output = run_command(&self.program, &args)
            .map_err(|e| TuneError::LoadToolUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(TuneError::LoadToolUnavailable(failure_message(&output)));
        }

        parse_ab_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract throughput and mean latency from ApacheBench output
///
/// Uses the `Requests per second:` line and the first `Time per request:`
/// line, which is the mean latency seen by a single client.
pub fn parse_ab_output(text: &str) -> Result<LoadResult> {
    fn field(text: &str, label: &str) -> Option<f64> {
        text.lines()
            .find_map(|line| line.trim().strip_prefix(label))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|value| value.parse().ok())
    }

    let requests_per_second = field(text, "Requests per second:");
    let mean_response_time_ms = field(text, "Time per request:");

    match (requests_per_second, mean_response_time_ms) {
        (Some(requests_per_second), Some(mean_response_time_ms)) => Ok(LoadResult {
            requests_per_second,
            mean_response_time_ms,
        }),
        _ => Err(TuneError::LoadToolUnavailable(
            "load tool output did not contain throughput and latency".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AB_OUTPUT: &str = "\
This is ApacheBench, Version 2.3 <$Revision: 1903618 $>

Server Software:        LiteSpeed
Document Path:          /
Concurrency Level:      10
Time taken for tests:   0.873 seconds
Complete requests:      1000
Failed requests:        0
Requests per second:    1145.52 [#/sec] (mean)
Time per request:       8.730 [ms] (mean)
Time per request:       0.873 [ms] (mean, across all concurrent requests)
Transfer rate:          5602.18 [Kbytes/sec] received
";

    #[test]
    fn test_parse_ab_output() {
        let result = parse_ab_output(AB_OUTPUT).unwrap();
        assert_eq!(result.requests_per_second, 1145.52);
        assert_eq!(result.mean_response_time_ms, 8.730);
    }

    #[test]
    fn test_parse_incomplete_output() {
        let err = parse_ab_output("apr_socket_recv: Connection refused (111)\n").unwrap_err();
        assert!(matches!(err, TuneError::LoadToolUnavailable(_)));
    }

    #[test]
    fn test_missing_tool() {
        let ab = ApacheBench::with_program("hwtune-no-such-ab");
        assert!(matches!(
            ab.run("http://127.0.0.1/", 10, 1),
            Err(TuneError::LoadToolUnavailable(_))
        ));
    }
}
