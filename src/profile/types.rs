//! Tuning profile data model
//!
//! Defines managed subsystems, typed setting values, server tiers and the
//! documented floor/ceiling table every generated profile must respect.

use crate::error::{Result, TuneError};
use crate::system::HardwareProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Externally installed service whose configuration the engine edits.
///
/// Variant order is the fixed apply order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// HTTP server
    WebServer,
    /// Application runtime worker pool
    Runtime,
    /// Relational database
    Database,
    /// Object cache
    Cache,
    /// Kernel/OS parameters
    Kernel,
}

impl Subsystem {
    /// All subsystems in apply order
    pub const ALL: [Subsystem; 5] = [
        Subsystem::WebServer,
        Subsystem::Runtime,
        Subsystem::Database,
        Subsystem::Cache,
        Subsystem::Kernel,
    ];

    /// Stable snake_case name
    pub fn name(&self) -> &'static str {
        match self {
            Subsystem::WebServer => "web_server",
            Subsystem::Runtime => "runtime",
            Subsystem::Database => "database",
            Subsystem::Cache => "cache",
            Subsystem::Kernel => "kernel",
        }
    }

    /// Render a value in this subsystem's native syntax
    pub fn render_value(&self, value: &SettingValue) -> String {
        match (self, value) {
            (Subsystem::Cache, SettingValue::Megabytes(mb)) => format!("{}mb", mb),
            (_, SettingValue::Megabytes(mb)) => format!("{}M", mb),
            (_, SettingValue::Integer(n)) => n.to_string(),
            (_, SettingValue::Text(s)) => s.clone(),
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Subsystem {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self> {
        Subsystem::ALL
            .iter()
            .copied()
            .find(|sub| sub.name() == s)
            .ok_or_else(|| TuneError::config(format!("Unknown subsystem: {}", s)))
    }
}

/// Typed value of a single setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingValue {
    /// Plain count
    Integer(u64),
    /// Size in megabytes
    Megabytes(u64),
    /// Literal string
    Text(String),
}

impl SettingValue {
    /// Numeric magnitude, if any
    pub fn numeric(&self) -> Option<u64> {
        match self {
            SettingValue::Integer(n) | SettingValue::Megabytes(n) => Some(*n),
            SettingValue::Text(_) => None,
        }
    }
}

/// One (key, value) pair for a subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Native configuration key
    pub key: String,
    /// Value to write
    pub value: SettingValue,
}

impl Setting {
    /// Create a new setting
    pub fn new(key: impl Into<String>, value: SettingValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Coarse hardware-capacity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerTier {
    /// Below the medium thresholds
    Small,
    /// More than 2000 MB RAM and more than 2 cores
    Medium,
    /// More than 4000 MB RAM and at least 4 cores
    Large,
}

impl ServerTier {
    /// Classify hardware; first match wins
    pub fn classify(hw: &HardwareProfile) -> Self {
        if hw.total_ram_mb > 4000 && hw.cpu_cores >= 4 {
            ServerTier::Large
        } else if hw.total_ram_mb > 2000 && hw.cpu_cores > 2 {
            ServerTier::Medium
        } else {
            ServerTier::Small
        }
    }

    /// Get tier name
    pub fn name(&self) -> &'static str {
        match self {
            ServerTier::Small => "small",
            ServerTier::Medium => "medium",
            ServerTier::Large => "large",
        }
    }
}

impl fmt::Display for ServerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Native keys written by the generator
pub mod keys {
    /// Web server connection cap
    pub const WEB_MAX_CONNECTIONS: &str = "maxConnections";
    /// Web server TLS connection cap
    pub const WEB_MAX_SSL_CONNECTIONS: &str = "maxSSLConnections";
    /// Web server worker process count
    pub const WEB_WORKER_PROCESSES: &str = "workerProcesses";
    /// Runtime per-request memory limit
    pub const RUNTIME_MEMORY_LIMIT: &str = "php_admin_value[memory_limit]";
    /// Runtime worker pool size
    pub const RUNTIME_MAX_CHILDREN: &str = "pm.max_children";
    /// Workers spawned at startup
    pub const RUNTIME_START_SERVERS: &str = "pm.start_servers";
    /// Minimum idle workers
    pub const RUNTIME_MIN_SPARE: &str = "pm.min_spare_servers";
    /// Maximum idle workers
    pub const RUNTIME_MAX_SPARE: &str = "pm.max_spare_servers";
    /// Database buffer pool
    pub const DB_BUFFER_POOL: &str = "innodb_buffer_pool_size";
    /// Database connection cap
    pub const DB_MAX_CONNECTIONS: &str = "max_connections";
    /// Database thread cache
    pub const DB_THREAD_CACHE: &str = "thread_cache_size";
    /// Cache memory cap
    pub const CACHE_MAX_MEMORY: &str = "maxmemory";
    /// Cache eviction policy
    pub const CACHE_EVICTION_POLICY: &str = "maxmemory-policy";
    /// Listen backlog
    pub const KERNEL_SOMAXCONN: &str = "net.core.somaxconn";
    /// SYN backlog
    pub const KERNEL_SYN_BACKLOG: &str = "net.ipv4.tcp_max_syn_backlog";
    /// Swap tendency
    pub const KERNEL_SWAPPINESS: &str = "vm.swappiness";
}

/// Documented floor/ceiling for a primary setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingBound {
    /// Owning subsystem
    pub subsystem: Subsystem,
    /// Native key
    pub key: &'static str,
    /// Inclusive lower bound
    pub floor: u64,
    /// Inclusive upper bound, if any
    pub ceiling: Option<u64>,
}

impl SettingBound {
    /// Constrain a computed value to this bound
    pub fn clamp(&self, value: u64) -> u64 {
        let value = value.max(self.floor);
        match self.ceiling {
            Some(ceiling) => value.min(ceiling),
            None => value,
        }
    }

    /// Whether a value satisfies this bound
    pub fn contains(&self, value: u64) -> bool {
        value >= self.floor && self.ceiling.map_or(true, |c| value <= c)
    }
}

/// Floor/ceiling table for every formula-derived setting
pub const SETTING_BOUNDS: [SettingBound; 7] = [
    SettingBound {
        subsystem: Subsystem::WebServer,
        key: keys::WEB_MAX_CONNECTIONS,
        floor: 500,
        ceiling: Some(10_000),
    },
    SettingBound {
        subsystem: Subsystem::WebServer,
        key: keys::WEB_WORKER_PROCESSES,
        floor: 2,
        ceiling: Some(32),
    },
    SettingBound {
        subsystem: Subsystem::Runtime,
        key: keys::RUNTIME_MEMORY_LIMIT,
        floor: 128,
        ceiling: Some(512),
    },
    SettingBound {
        subsystem: Subsystem::Runtime,
        key: keys::RUNTIME_MAX_CHILDREN,
        floor: 10,
        ceiling: Some(100),
    },
    SettingBound {
        subsystem: Subsystem::Database,
        key: keys::DB_BUFFER_POOL,
        floor: 256,
        ceiling: None,
    },
    SettingBound {
        subsystem: Subsystem::Database,
        key: keys::DB_MAX_CONNECTIONS,
        floor: 50,
        ceiling: Some(1000),
    },
    SettingBound {
        subsystem: Subsystem::Cache,
        key: keys::CACHE_MAX_MEMORY,
        floor: 64,
        ceiling: None,
    },
];

/// Look up the bound for a subsystem key
pub fn bound_for(subsystem: Subsystem, key: &str) -> Option<&'static SettingBound> {
    SETTING_BOUNDS
        .iter()
        .find(|b| b.subsystem == subsystem && b.key == key)
}

/// Named, immutable configuration profile derived from hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningProfile {
    /// Unique key within the store
    pub name: String,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Hardware snapshot the profile was derived from
    pub hardware_basis: HardwareProfile,
    /// Derived capacity tier
    pub server_tier: ServerTier,
    /// Ordered settings per subsystem
    pub settings: BTreeMap<Subsystem, Vec<Setting>>,
}

impl TuningProfile {
    /// Settings for one subsystem (empty if none)
    pub fn settings_for(&self, subsystem: Subsystem) -> &[Setting] {
        self.settings
            .get(&subsystem)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up a single value
    pub fn get(&self, subsystem: Subsystem, key: &str) -> Option<&SettingValue> {
        self.settings_for(subsystem)
            .iter()
            .find(|s| s.key == key)
            .map(|s| &s.value)
    }

    /// Look up a single numeric value
    pub fn numeric(&self, subsystem: Subsystem, key: &str) -> Option<u64> {
        self.get(subsystem, key).and_then(SettingValue::numeric)
    }

    /// Verify every bounded setting lies within its floor/ceiling
    pub fn check_bounds(&self) -> Result<()> {
        for (subsystem, settings) in &self.settings {
            for setting in settings {
                let (Some(bound), Some(value)) =
                    (bound_for(*subsystem, &setting.key), setting.value.numeric())
                else {
                    continue;
                };
                if !bound.contains(value) {
                    return Err(TuneError::BoundsViolation {
                        subsystem: *subsystem,
                        key: setting.key.clone(),
                        value,
                        floor: bound.floor,
                        ceiling: bound
                            .ceiling
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "none".to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Summary record for listings
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            name: self.name.clone(),
            tier: self.server_tier,
            generated_at: self.generated_at,
        }
    }

    /// Print profile to console
    pub fn print_summary(&self) {
        println!("=== Profile: {} ===\n", self.name);
        println!("Generated: {}", self.generated_at.to_rfc3339());
        println!("Tier:      {}", self.server_tier);
        println!(
            "Basis:     {} cores, {} MB RAM, {} GB disk ({})",
            self.hardware_basis.cpu_cores,
            self.hardware_basis.total_ram_mb,
            self.hardware_basis.total_disk_gb,
            self.hardware_basis.network_interface
        );

        for (subsystem, settings) in &self.settings {
            println!("\n[{}]", subsystem);
            for setting in settings {
                println!(
                    "  {:32} {}",
                    setting.key,
                    subsystem.render_value(&setting.value)
                );
            }
        }
    }
}

/// Listing entry for a stored profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Profile name
    pub name: String,
    /// Derived tier
    pub tier: ServerTier,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
}
