//! Error types for hwtune
//!
//! This module defines all error types used throughout the engine,
//! providing detailed error information for operators and callers.

use crate::apply::ApplyReport;
use crate::profile::Subsystem;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tuning operations
#[derive(Error, Debug)]
pub enum TuneError {
    /// A mandatory hardware metric could not be read
    #[error("Hardware detection failed: {0}")]
    HardwareDetection(String),

    /// The named profile does not exist in the store
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile name cannot be used as a store key
    #[error("Invalid profile name '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidProfileName(String),

    /// A generated setting lies outside its documented floor/ceiling
    #[error("Setting {subsystem}.{key} = {value} is outside [{floor}, {ceiling}]")]
    BoundsViolation {
        /// Subsystem owning the setting
        subsystem: Subsystem,
        /// Setting key
        key: String,
        /// Offending value
        value: u64,
        /// Lowest allowed value
        floor: u64,
        /// Highest allowed value, or `none` when unbounded
        ceiling: String,
    },

    /// Refusing to remove the active profile
    #[error("Profile '{0}' is the active profile")]
    ProfileInUse(String),

    /// Subsystem rejected the new configuration
    #[error("{subsystem} configuration failed validation: {message}")]
    SubsystemValidation {
        /// Subsystem whose check failed
        subsystem: Subsystem,
        /// Validator output
        message: String,
    },

    /// Subsystem could not be reloaded or restarted
    #[error("{subsystem} reload failed: {message}")]
    SubsystemReload {
        /// Subsystem whose service failed
        subsystem: Subsystem,
        /// Service manager output
        message: String,
    },

    /// The HTTP load generation tool is missing or unusable
    #[error("Load generation tool unavailable: {0}")]
    LoadToolUnavailable(String),

    /// The database workload could not be executed
    #[error("Database workload unavailable: {0}")]
    DatabaseUnavailable(String),

    /// Another apply run holds the host lock
    #[error("Another apply run is in progress (lock held on '{0}')")]
    ApplyInProgress(PathBuf),

    /// Every attempted subsystem failed
    #[error("Apply of profile '{}' failed for every subsystem", .report.profile_name)]
    ApplyFailed {
        /// Per-subsystem report of the failed run
        report: Box<ApplyReport>,
    },

    /// Caller passed an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error with path context
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization or parsing of persisted state failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// External command could not be spawned or exited unsuccessfully
    #[error("Command '{command}' failed: {message}")]
    Command {
        /// Command line as run
        command: String,
        /// stderr, stdout or exit status of the command
        message: String,
    },
}

impl TuneError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a command failure
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a validation failure for a subsystem
    pub fn validation(subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self::SubsystemValidation {
            subsystem,
            message: message.into(),
        }
    }

    /// Create a reload failure for a subsystem
    pub fn reload(subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self::SubsystemReload {
            subsystem,
            message: message.into(),
        }
    }
}

/// Result type alias for tuning operations
pub type Result<T> = std::result::Result<T, TuneError>;

impl From<std::io::Error> for TuneError {
    fn from(err: std::io::Error) -> Self {
        TuneError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TuneError {
    fn from(err: serde_json::Error) -> Self {
        TuneError::Serialization(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| TuneError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = TuneError::io("/var/lib/hwtune/profiles/auto.json", io_err);
        match &err {
            TuneError::Io { path, .. } => {
                assert_eq!(path, &PathBuf::from("/var/lib/hwtune/profiles/auto.json"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let err = res.with_path("/etc/redis/redis.conf").unwrap_err();
        assert!(err.to_string().contains("/etc/redis/redis.conf"));
    }

    #[test]
    fn test_validation_message_names_subsystem() {
        let err = TuneError::validation(Subsystem::WebServer, "unexpected '}'");
        assert!(err.to_string().starts_with("web_server"));
    }
}
