//! Engine configuration file
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration for a typical single-host stack.

use super::settings::CliArgs;
use crate::apply::{ConfigSyntax, FileSurface};
use crate::bench::BenchmarkConfig;
use crate::error::{IoResultExt, Result, TuneError};
use crate::monitor::{Thresholds, DEFAULT_MONITOR_INTERVAL};
use crate::profile::Subsystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default state directory
pub const DEFAULT_STATE_DIR: &str = "/var/lib/hwtune";

/// Where and how one subsystem is configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Configuration file the tuned keys are written to
    pub path: PathBuf,
    /// Native syntax of that file
    pub syntax: ConfigSyntax,
    /// Command that checks the written configuration (program, then args)
    #[serde(default)]
    pub validate_command: Vec<String>,
    /// Service unit reloaded or restarted after a change
    #[serde(default)]
    pub unit: Option<String>,
    /// Whether the subsystem is managed at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl SurfaceConfig {
    fn new(path: &str, syntax: ConfigSyntax, validate: &[&str], unit: Option<&str>) -> Self {
        Self {
            path: PathBuf::from(path),
            syntax,
            validate_command: validate.iter().map(|s| s.to_string()).collect(),
            unit: unit.map(str::to_string),
            enabled: true,
        }
    }

    /// Build the file surface for `subsystem`
    pub fn surface(&self, subsystem: Subsystem) -> FileSurface {
        FileSurface::new(subsystem, &self.path, self.syntax.clone())
            .with_validate_command(self.validate_command.clone())
    }
}

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Endpoint whose response time is watched
    pub url: String,
    /// Sampling interval in seconds
    pub interval_secs: u64,
    /// Timeout for one latency probe in seconds
    pub probe_timeout_secs: u64,
    /// Breach thresholds
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/".to_string(),
            interval_secs: DEFAULT_MONITOR_INTERVAL.as_secs(),
            probe_timeout_secs: 30,
            thresholds: Thresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Sampling interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Latency probe timeout
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Profiles, backups, benchmark log and apply lock live here
    pub state_dir: PathBuf,
    /// Pause after activating each subsystem, in seconds
    pub stabilization_secs: u64,
    /// Managed subsystems
    pub surfaces: BTreeMap<Subsystem, SurfaceConfig>,
    /// Extra `mysql` client arguments for the database workload
    pub database_client_args: Vec<String>,
    /// Benchmark settings
    pub benchmark: BenchmarkConfig,
    /// Monitor settings
    pub monitor: MonitorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut surfaces = BTreeMap::new();
        surfaces.insert(
            Subsystem::WebServer,
            SurfaceConfig::new(
                "/usr/local/lsws/conf/httpd_config.conf",
                ConfigSyntax::SpaceSeparated,
                &["/usr/local/lsws/bin/openlitespeed", "-t"],
                Some("lsws"),
            ),
        );
        surfaces.insert(
            Subsystem::Runtime,
            SurfaceConfig::new(
                "/etc/php/8.2/fpm/pool.d/www.conf",
                ConfigSyntax::Ini {
                    section: "www".to_string(),
                },
                &["php-fpm8.2", "-t"],
                Some("php8.2-fpm"),
            ),
        );
        surfaces.insert(
            Subsystem::Database,
            SurfaceConfig::new(
                "/etc/mysql/mariadb.conf.d/60-hwtune.cnf",
                ConfigSyntax::Ini {
                    section: "mysqld".to_string(),
                },
                &[],
                Some("mariadb"),
            ),
        );
        surfaces.insert(
            Subsystem::Cache,
            SurfaceConfig::new(
                "/etc/redis/redis.conf",
                ConfigSyntax::SpaceSeparated,
                &[],
                Some("redis-server"),
            ),
        );
        surfaces.insert(
            Subsystem::Kernel,
            SurfaceConfig::new(
                "/etc/sysctl.d/60-hwtune.conf",
                ConfigSyntax::KeyEquals,
                &[],
                None,
            ),
        );

        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            stabilization_secs: 10,
            surfaces,
            database_client_args: Vec::new(),
            benchmark: BenchmarkConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| TuneError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from CLI arguments
    ///
    /// `--state-dir` (or `HWTUNE_STATE_DIR`) overrides the file's value.
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(dir) = &args.state_dir {
            config.state_dir = dir.clone();
        }
        Ok(config)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(TuneError::config("state_dir must not be empty"));
        }
        if self.benchmark.requests == 0 || self.benchmark.concurrency == 0 {
            return Err(TuneError::config(
                "benchmark requests and concurrency must be at least 1",
            ));
        }
        if self.benchmark.concurrency > self.benchmark.requests {
            return Err(TuneError::config(
                "benchmark concurrency cannot exceed the request count",
            ));
        }
        if self.monitor.interval_secs == 0 {
            return Err(TuneError::config("monitor interval must be at least 1 second"));
        }
        for (subsystem, surface) in &self.surfaces {
            if surface.enabled && surface.path.as_os_str().is_empty() {
                return Err(TuneError::config(format!("{} surface has no path", subsystem)));
            }
        }
        Ok(())
    }

    /// Pause after each subsystem activation
    pub fn stabilization(&self) -> Duration {
        Duration::from_secs(self.stabilization_secs)
    }

    /// File surfaces of enabled subsystems, in apply order
    pub fn file_surfaces(&self) -> Vec<FileSurface> {
        self.surfaces
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(subsystem, s)| s.surface(*subsystem))
            .collect()
    }

    /// Service units of enabled subsystems
    pub fn service_units(&self) -> BTreeMap<Subsystem, String> {
        self.surfaces
            .iter()
            .filter(|(_, s)| s.enabled)
            .filter_map(|(subsystem, s)| s.unit.clone().map(|unit| (*subsystem, unit)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/hwtune"));
        assert_eq!(config.stabilization(), Duration::from_secs(10));
        assert_eq!(config.benchmark.requests, 1000);
        assert_eq!(config.benchmark.concurrency, 10);
        assert_eq!(config.benchmark.rounds, 3);
        assert_eq!(config.monitor.interval(), Duration::from_secs(60));
        assert_eq!(config.file_surfaces().len(), 5);
        assert!(!config.service_units().contains_key(&Subsystem::Kernel));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hwtune.json");
        std::fs::write(
            &path,
            r#"{
                "stabilization_secs": 2,
                "benchmark": { "rounds": 5 },
                "surfaces": {
                    "kernel": { "path": "/tmp/sysctl.conf", "syntax": { "kind": "key_equals" } },
                    "cache": {
                        "path": "/etc/redis/redis.conf",
                        "syntax": { "kind": "space_separated" },
                        "enabled": false
                    }
                }
            }"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.stabilization_secs, 2);
        assert_eq!(config.benchmark.rounds, 5);
        assert_eq!(config.benchmark.requests, 1000);
        assert_eq!(config.surfaces.len(), 2);

        let surfaces = config.file_surfaces();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].path(), Path::new("/tmp/sysctl.conf"));
    }

    #[test]
    fn test_ini_syntax_in_file() {
        let surface: SurfaceConfig = serde_json::from_str(
            r#"{ "path": "/etc/mysql/my.cnf", "syntax": { "kind": "ini", "section": "mysqld" },
                 "validate_command": ["mysqld", "--validate-config"], "unit": "mysql" }"#,
        )
        .unwrap();
        assert_eq!(
            surface.syntax,
            ConfigSyntax::Ini {
                section: "mysqld".into()
            }
        );
        assert!(surface.enabled);
        assert_eq!(surface.unit.as_deref(), Some("mysql"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.benchmark.concurrency = 2000;
        assert!(matches!(config.validate(), Err(TuneError::ConfigError(_))));

        let mut config = EngineConfig::default();
        config.monitor.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hwtune.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(TuneError::ConfigError(_))
        ));
    }

    #[test]
    fn test_cli_state_dir_override() {
        let args =
            CliArgs::try_parse_from(["hwtune", "--state-dir", "/srv/hwtune", "list-profiles"])
                .unwrap();
        let config = EngineConfig::from_cli(&args).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/srv/hwtune"));
    }
}
