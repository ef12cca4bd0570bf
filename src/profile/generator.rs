//! Profile generation
//!
//! Derives a bounded, deterministic [`TuningProfile`] from a
//! [`HardwareProfile`]. Each subsystem has a typed settings builder; every
//! formula output is clamped to its documented bound before it is written.

use super::types::{
    bound_for, keys, ServerTier, Setting, SettingValue, Subsystem, TuningProfile,
};
use crate::system::HardwareProfile;
use chrono::Utc;
use std::collections::BTreeMap;

/// Web server settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebServerSettings {
    /// Maximum concurrent connections
    pub max_connections: u64,
    /// Maximum concurrent TLS connections
    pub max_ssl_connections: u64,
    /// Worker process count
    pub worker_processes: u64,
}

impl WebServerSettings {
    /// Derive from hardware
    pub fn derive(hw: &HardwareProfile) -> Self {
        let max_connections = clamped(
            Subsystem::WebServer,
            keys::WEB_MAX_CONNECTIONS,
            hw.total_ram_mb.saturating_mul(2),
        );
        let worker_processes = clamped(
            Subsystem::WebServer,
            keys::WEB_WORKER_PROCESSES,
            u64::from(hw.cpu_cores).saturating_mul(2),
        );

        Self {
            max_connections,
            max_ssl_connections: max_connections / 2,
            worker_processes,
        }
    }

    /// Native settings in write order
    pub fn into_settings(self) -> Vec<Setting> {
        vec![
            Setting::new(keys::WEB_MAX_CONNECTIONS, SettingValue::Integer(self.max_connections)),
            Setting::new(
                keys::WEB_MAX_SSL_CONNECTIONS,
                SettingValue::Integer(self.max_ssl_connections),
            ),
            Setting::new(keys::WEB_WORKER_PROCESSES, SettingValue::Integer(self.worker_processes)),
        ]
    }
}

/// Application runtime worker pool settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Per-request memory limit in MB
    pub memory_limit_mb: u64,
    /// Worker pool size
    pub max_children: u64,
    /// Workers spawned at startup
    pub start_servers: u64,
    /// Minimum idle workers
    pub min_spare_servers: u64,
    /// Maximum idle workers
    pub max_spare_servers: u64,
}

impl RuntimeSettings {
    /// Derive from hardware
    pub fn derive(hw: &HardwareProfile) -> Self {
        let memory_limit_mb = clamped(
            Subsystem::Runtime,
            keys::RUNTIME_MEMORY_LIMIT,
            hw.total_ram_mb / 4,
        );
        let max_children = clamped(
            Subsystem::Runtime,
            keys::RUNTIME_MAX_CHILDREN,
            hw.total_ram_mb / 50,
        );

        Self {
            memory_limit_mb,
            max_children,
            start_servers: max_children / 4,
            min_spare_servers: max_children / 4,
            max_spare_servers: max_children / 2,
        }
    }

    /// Native settings in write order
    pub fn into_settings(self) -> Vec<Setting> {
        vec![
            Setting::new(keys::RUNTIME_MEMORY_LIMIT, SettingValue::Megabytes(self.memory_limit_mb)),
            Setting::new(keys::RUNTIME_MAX_CHILDREN, SettingValue::Integer(self.max_children)),
            Setting::new(keys::RUNTIME_START_SERVERS, SettingValue::Integer(self.start_servers)),
            Setting::new(keys::RUNTIME_MIN_SPARE, SettingValue::Integer(self.min_spare_servers)),
            Setting::new(keys::RUNTIME_MAX_SPARE, SettingValue::Integer(self.max_spare_servers)),
        ]
    }
}

/// Database server settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Buffer pool size in MB
    pub buffer_pool_mb: u64,
    /// Maximum client connections
    pub max_connections: u64,
    /// Cached server threads
    pub thread_cache_size: u64,
}

impl DatabaseSettings {
    /// Derive from hardware
    pub fn derive(hw: &HardwareProfile) -> Self {
        let buffer_pool_mb = clamped(
            Subsystem::Database,
            keys::DB_BUFFER_POOL,
            percent_of(hw.total_ram_mb, 70),
        );
        let max_connections = clamped(
            Subsystem::Database,
            keys::DB_MAX_CONNECTIONS,
            hw.total_ram_mb / 12,
        );

        Self {
            buffer_pool_mb,
            max_connections,
            thread_cache_size: max_connections / 10,
        }
    }

    /// Native settings in write order
    pub fn into_settings(self) -> Vec<Setting> {
        vec![
            Setting::new(keys::DB_BUFFER_POOL, SettingValue::Megabytes(self.buffer_pool_mb)),
            Setting::new(keys::DB_MAX_CONNECTIONS, SettingValue::Integer(self.max_connections)),
            Setting::new(keys::DB_THREAD_CACHE, SettingValue::Integer(self.thread_cache_size)),
        ]
    }
}

/// Object cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Memory cap in MB
    pub max_memory_mb: u64,
}

impl CacheSettings {
    /// Eviction policy written alongside the memory cap
    pub const EVICTION_POLICY: &'static str = "allkeys-lru";

    /// Derive from hardware
    pub fn derive(hw: &HardwareProfile) -> Self {
        Self {
            max_memory_mb: clamped(
                Subsystem::Cache,
                keys::CACHE_MAX_MEMORY,
                percent_of(hw.total_ram_mb, 20),
            ),
        }
    }

    /// Native settings in write order
    pub fn into_settings(self) -> Vec<Setting> {
        vec![
            Setting::new(keys::CACHE_MAX_MEMORY, SettingValue::Megabytes(self.max_memory_mb)),
            Setting::new(
                keys::CACHE_EVICTION_POLICY,
                SettingValue::Text(Self::EVICTION_POLICY.to_string()),
            ),
        ]
    }
}

/// Kernel network and memory parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSettings {
    /// Listen backlog, follows the web server connection cap
    pub somaxconn: u64,
    /// SYN backlog
    pub tcp_max_syn_backlog: u64,
    /// Swap tendency
    pub swappiness: u64,
}

impl KernelSettings {
    /// Swappiness that keeps file cache resident on service hosts
    pub const SWAPPINESS: u64 = 10;

    /// Derive from the already-clamped web server settings
    pub fn derive(web: &WebServerSettings) -> Self {
        Self {
            somaxconn: web.max_connections,
            tcp_max_syn_backlog: web.max_connections / 2,
            swappiness: Self::SWAPPINESS,
        }
    }

    /// Native settings in write order
    pub fn into_settings(self) -> Vec<Setting> {
        vec![
            Setting::new(keys::KERNEL_SOMAXCONN, SettingValue::Integer(self.somaxconn)),
            Setting::new(keys::KERNEL_SYN_BACKLOG, SettingValue::Integer(self.tcp_max_syn_backlog)),
            Setting::new(keys::KERNEL_SWAPPINESS, SettingValue::Integer(self.swappiness)),
        ]
    }
}

/// Generates tuning profiles from hardware snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileGenerator;

impl ProfileGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self
    }

    /// Derive the named profile for the given hardware
    pub fn generate(&self, hw: &HardwareProfile, name: &str) -> TuningProfile {
        let web = WebServerSettings::derive(hw);

        let mut settings = BTreeMap::new();
        settings.insert(Subsystem::WebServer, web.into_settings());
        settings.insert(Subsystem::Runtime, RuntimeSettings::derive(hw).into_settings());
        settings.insert(Subsystem::Database, DatabaseSettings::derive(hw).into_settings());
        settings.insert(Subsystem::Cache, CacheSettings::derive(hw).into_settings());
        settings.insert(Subsystem::Kernel, KernelSettings::derive(&web).into_settings());

        let server_tier = ServerTier::classify(hw);

        tracing::debug!(
            profile = name,
            tier = %server_tier,
            cpu_cores = hw.cpu_cores,
            total_ram_mb = hw.total_ram_mb,
            "Generated tuning profile"
        );

        TuningProfile {
            name: name.to_string(),
            generated_at: Utc::now(),
            hardware_basis: hw.clone(),
            server_tier,
            settings,
        }
    }
}

/// Derive the named profile for the given hardware
pub fn generate_profile(hw: &HardwareProfile, name: &str) -> TuningProfile {
    ProfileGenerator::new().generate(hw, name)
}

fn clamped(subsystem: Subsystem, key: &str, value: u64) -> u64 {
    match bound_for(subsystem, key) {
        Some(bound) => bound.clamp(value),
        None => value,
    }
}

/// Integer share of a value, truncating toward zero
fn percent_of(value: u64, percent: u64) -> u64 {
    (u128::from(value) * u128::from(percent) / 100) as u64
}
