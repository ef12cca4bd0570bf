//! Threshold evaluation
//!
//! Pure comparison of one monitor sample against configured limits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory limits for monitored metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU usage percent
    pub cpu_percent: f64,
    /// Memory usage percent
    pub memory_percent: f64,
    /// Endpoint response time in milliseconds
    pub response_time_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            response_time_ms: 5000.0,
        }
    }
}

/// Metric checked by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMetric {
    /// Global CPU usage percent
    CpuUsage,
    /// Used memory percent
    MemoryUsage,
    /// Local endpoint response time
    ResponseTime,
}

impl MonitorMetric {
    /// Static remediation advice for a breach of this metric
    pub fn hint(&self) -> &'static str {
        match self {
            MonitorMetric::CpuUsage => {
                "reduce worker processes or pm.max_children, or enable page caching"
            }
            MonitorMetric::MemoryUsage => {
                "lower innodb_buffer_pool_size or cache maxmemory, or regenerate the profile"
            }
            MonitorMetric::ResponseTime => {
                "check slow queries and cache hit rate, then benchmark the active profile"
            }
        }
    }
}

impl fmt::Display for MonitorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorMetric::CpuUsage => write!(f, "cpu_usage_percent"),
            MonitorMetric::MemoryUsage => write!(f, "memory_usage_percent"),
            MonitorMetric::ResponseTime => write!(f, "response_time_ms"),
        }
    }
}

/// One monitor reading; `None` where the metric could not be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSample {
    /// CPU usage percent
    pub cpu_usage_percent: Option<f64>,
    /// Memory usage percent
    pub memory_usage_percent: Option<f64>,
    /// Endpoint response time in milliseconds
    pub response_time_ms: Option<f64>,
}

/// A metric above its threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdBreach {
    /// Metric that crossed its limit
    pub metric: MonitorMetric,
    /// Observed value
    pub value: f64,
    /// Configured limit
    pub threshold: f64,
    /// Remediation advice
    pub hint: &'static str,
}

/// Metrics in `sample` strictly above their threshold
pub fn evaluate(sample: &MonitorSample, thresholds: &Thresholds) -> Vec<ThresholdBreach> {
    [
        (MonitorMetric::CpuUsage, sample.cpu_usage_percent, thresholds.cpu_percent),
        (MonitorMetric::MemoryUsage, sample.memory_usage_percent, thresholds.memory_percent),
        (MonitorMetric::ResponseTime, sample.response_time_ms, thresholds.response_time_ms),
    ]
    .into_iter()
    .filter_map(|(metric, value, threshold)| {
        let value = value?;
        (value > threshold).then(|| ThresholdBreach {
            metric,
            value,
            threshold,
            hint: metric.hint(),
        })
    })
    .collect()
}
