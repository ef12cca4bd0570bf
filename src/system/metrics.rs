//! Live metric sources
//!
//! Typed interfaces for instantaneous host metrics and HTTP latency to the
//! locally served endpoint. Platform-specific reading stays inside the
//! adapters in this file.

use crate::error::{Result, TuneError};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{Disks, System};

/// One instantaneous reading of host utilization
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    /// Global CPU usage (0-100)
    pub cpu_usage_percent: f64,
    /// Used memory as a share of total (0-100)
    pub memory_usage_percent: f64,
    /// Used space on the primary volume (0-100)
    pub disk_usage_percent: f64,
    /// 1-minute load average
    pub load_average: f64,
}

/// Source of host utilization metrics
pub trait MetricSource: Send + Sync {
    /// Take one sample
    fn sample(&self) -> Result<SystemSample>;
}

/// Measures HTTP response time to an endpoint
pub trait LatencyProbe: Send + Sync {
    /// Round-trip time of one request in milliseconds
    fn response_time_ms(&self, url: &str) -> Result<f64>;
}

/// [`MetricSource`] backed by `sysinfo`
pub struct SysinfoMetrics {
    sys: Mutex<System>,
}

impl SysinfoMetrics {
    /// Create a new metric source
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }

    fn disk_usage_percent() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.iter().max_by_key(|d| d.total_space()));

        match root {
            Some(disk) if disk.total_space() > 0 => {
                let used = disk.total_space().saturating_sub(disk.available_space());
                used as f64 / disk.total_space() as f64 * 100.0
            }
            _ => 0.0,
        }
    }
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoMetrics {
    fn sample(&self) -> Result<SystemSample> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|_| TuneError::config("metric source lock poisoned"))?;

        // CPU usage is a delta between two refreshes
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let memory_usage_percent = if sys.total_memory() > 0 {
            sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
        } else {
            0.0
        };

        Ok(SystemSample {
            cpu_usage_percent: sys.global_cpu_usage() as f64,
            memory_usage_percent,
            disk_usage_percent: Self::disk_usage_percent(),
            load_average: System::load_average().one,
        })
    }
}

/// [`LatencyProbe`] issuing a blocking HTTP GET
pub struct HttpLatencyProbe {
    client: reqwest::blocking::Client,
}

impl HttpLatencyProbe {
    /// Create a probe with a request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TuneError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl LatencyProbe for HttpLatencyProbe {
    fn response_time_ms(&self, url: &str) -> Result<f64> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TuneError::command(format!("GET {}", url), e.to_string()))?;
        // Include body transfer in the measurement
        let _ = response
            .bytes()
            .map_err(|e| TuneError::command(format!("GET {}", url), e.to_string()))?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }
}
