//! # hwtune - Hardware-Aware Tuning Engine
//!
//! hwtune measures host hardware, derives a bounded and deterministic
//! tuning profile for a web hosting stack, applies it with backup and
//! rollback safety, and validates the result through benchmarking and
//! continuous threshold monitoring.
//!
//! ## Features
//!
//! - **Hardware Detection**: CPU cores, memory, root volume and default interface
//! - **Deterministic Profiles**: Same hardware always yields the same settings
//! - **Bounded Settings**: Every numeric value is clamped to a documented range
//! - **Safe Application**: Per-subsystem backup, validation, rollback and reload
//! - **Benchmarking**: Repeatable load tests with an averaged performance score
//! - **Monitoring**: Advisory threshold-breach logging on a fixed interval
//!
//! ## Quick Start
//!
//! ```no_run
//! use hwtune::profile::{generate_profile, ProfileStore};
//! use hwtune::system::HardwareProfiler;
//!
//! let hardware = HardwareProfiler::new().detect().unwrap();
//! let profile = generate_profile(&hardware, "auto");
//! profile.print_summary();
//!
//! let store = ProfileStore::open("/var/lib/hwtune").unwrap();
//! store.save(&profile).unwrap();
//! ```
//!
//! ## Applying a Profile
//!
//! ```no_run
//! use hwtune::apply::{ConfigSyntax, FileSurface, ProfileApplier, SystemdServiceControl};
//! use hwtune::profile::{ProfileStore, Subsystem};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let store = Arc::new(ProfileStore::open("/var/lib/hwtune").unwrap());
//! let mut units = BTreeMap::new();
//! units.insert(Subsystem::Cache, "redis-server".to_string());
//!
//! let applier = ProfileApplier::new(store, Arc::new(SystemdServiceControl::new(units)))
//!     .with_surface(Box::new(FileSurface::new(
//!         Subsystem::Cache,
//!         "/etc/redis/redis.conf",
//!         ConfigSyntax::SpaceSeparated,
//!     )));
//!
//! let report = applier.apply_named("auto").unwrap();
//! report.print_table();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod bench;
pub mod config;
pub mod error;
pub mod monitor;
pub mod profile;
pub mod progress;
pub mod system;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Result, TuneError};
pub use profile::{ProfileStore, TuningProfile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use hwtune::prelude::*;
    //! ```

    pub use crate::apply::{ApplyOutcome, ApplyReport, ProfileApplier};
    pub use crate::bench::{BenchmarkConfig, BenchmarkResult, BenchmarkRunner};
    pub use crate::config::EngineConfig;
    pub use crate::error::{Result, TuneError};
    pub use crate::monitor::{Monitor, MonitorHandle, Thresholds};
    pub use crate::profile::{generate_profile, ProfileStore, Subsystem, TuningProfile};
    pub use crate::system::{HardwareProfile, HardwareProfiler};
}
