//! Continuous monitoring
//!
//! Periodic sampling of host utilization and endpoint latency with
//! advisory threshold-breach logging.

mod thresholds;
mod watcher;

pub use thresholds::*;
pub use watcher::*;
