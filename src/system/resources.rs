//! Host hardware detection
//!
//! Detects CPU, memory, disk and network capacity to derive tuning
//! profiles for the current host.

use crate::error::{Result, TuneError};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, System};

/// Placeholder used when the primary network interface cannot be determined
pub const UNKNOWN_INTERFACE: &str = "unknown";

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// Snapshot of host capacity used as the basis for a tuning profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Logical CPU count
    pub cpu_cores: u32,
    /// Total physical memory in MB
    pub total_ram_mb: u64,
    /// Total space on the primary volume in GB
    pub total_disk_gb: u64,
    /// Default-route network interface (informational only)
    pub network_interface: String,
}

impl HardwareProfile {
    /// Build a profile from known capacity values
    pub fn new(cpu_cores: u32, total_ram_mb: u64, total_disk_gb: u64) -> Self {
        Self {
            cpu_cores,
            total_ram_mb,
            total_disk_gb,
            network_interface: UNKNOWN_INTERFACE.to_string(),
        }
    }

    /// Set the network interface name
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.network_interface = name.into();
        self
    }

    /// Print hardware summary to console
    pub fn print_summary(&self) {
        println!("=== Hardware Profile ===\n");
        println!("  CPU cores:  {}", self.cpu_cores);
        println!(
            "  Memory:     {}",
            humansize::format_size(self.total_ram_mb * MB, humansize::BINARY)
        );
        println!(
            "  Disk:       {}",
            humansize::format_size(self.total_disk_gb * GB, humansize::BINARY)
        );
        println!("  Interface:  {}", self.network_interface);
    }
}

/// Reads host capacity from the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareProfiler;

impl HardwareProfiler {
    /// Create a new profiler
    pub fn new() -> Self {
        Self
    }

    /// Detect the current host's hardware profile.
    ///
    /// Fails if CPU count, memory or disk capacity cannot be read. The
    /// network interface is best-effort and falls back to
    /// [`UNKNOWN_INTERFACE`].
    pub fn detect(&self) -> Result<HardwareProfile> {
        let mut sys = System::new();
        sys.refresh_memory();

        let cpu_cores = num_cpus::get() as u32;
        if cpu_cores == 0 {
            return Err(TuneError::HardwareDetection(
                "no logical CPUs reported".to_string(),
            ));
        }

        let total_ram_mb = sys.total_memory() / MB;
        if total_ram_mb == 0 {
            return Err(TuneError::HardwareDetection(
                "total memory reported as zero".to_string(),
            ));
        }

        let (total_disk, available_disk) = Self::primary_disk().ok_or_else(|| {
            TuneError::HardwareDetection("no primary disk volume found".to_string())
        })?;
        let total_disk_gb = total_disk / GB;
        if total_disk_gb == 0 {
            return Err(TuneError::HardwareDetection(
                "primary volume is smaller than 1 GB".to_string(),
            ));
        }

        let network_interface =
            Self::default_interface().unwrap_or_else(|| UNKNOWN_INTERFACE.to_string());

        tracing::debug!(
            cpu_cores,
            total_ram_mb,
            available_ram_mb = sys.available_memory() / MB,
            total_disk_gb,
            available_disk_gb = available_disk / GB,
            interface = %network_interface,
            "Detected hardware"
        );

        Ok(HardwareProfile {
            cpu_cores,
            total_ram_mb,
            total_disk_gb,
            network_interface,
        })
    }

    /// Total and available bytes of the root volume, or the largest disk
    fn primary_disk() -> Option<(u64, u64)> {
        let disks = Disks::new_with_refreshed_list();

        let root = disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"));

        root.or_else(|| disks.iter().max_by_key(|d| d.total_space()))
            .map(|d| (d.total_space(), d.available_space()))
    }

    /// Name of the interface carrying the default route
    fn default_interface() -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(content) = std::fs::read_to_string("/proc/net/route") {
                if let Some(name) = parse_default_route(&content) {
                    return Some(name);
                }
            }
        }

        let networks = Networks::new_with_refreshed_list();
        let mut names: Vec<&String> = networks
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !is_loopback(name))
            .collect();
        names.sort();
        names.first().map(|name| name.to_string())
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.starts_with("Loopback")
}

/// Find the interface whose destination is 0.0.0.0 in /proc/net/route
fn parse_default_route(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        let destination = fields.next()?;
        (destination == "00000000").then(|| iface.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_reads_mandatory_metrics() {
        // Sandboxed CI hosts may not expose a disk volume
        if let Ok(hw) = HardwareProfiler::new().detect() {
            assert!(hw.cpu_cores >= 1);
            assert!(hw.total_ram_mb >= 1);
            assert!(hw.total_disk_gb >= 1);
            assert!(!hw.network_interface.is_empty());
        }
    }

    #[test]
    fn test_parse_default_route() {
        let table = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\n\
                     docker0\t000011AC\t00000000\t0001\t0\t0\t0\t0000FFFF\n\
                     eth0\t00000000\t0102A8C0\t0003\t0\t0\t100\t00000000\n";
        assert_eq!(parse_default_route(table), Some("eth0".to_string()));
    }

    #[test]
    fn test_parse_default_route_missing() {
        let table = "Iface\tDestination\tGateway\n\
                     docker0\t000011AC\t00000000\n";
        assert_eq!(parse_default_route(table), None);
    }

    #[test]
    fn test_new_defaults_interface() {
        let hw = HardwareProfile::new(4, 8192, 100);
        assert_eq!(hw.network_interface, UNKNOWN_INTERFACE);
        assert_eq!(hw.with_interface("ens3").network_interface, "ens3");
    }

    #[test]
    fn test_loopback_filter() {
        assert!(is_loopback("lo"));
        assert!(!is_loopback("eth0"));
    }
}
