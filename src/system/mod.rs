//! Host system integration
//!
//! Hardware capacity detection, live metric sources, and helpers for
//! invoking external tools.

pub mod command;
mod metrics;
mod resources;

pub use metrics::*;
pub use resources::*;
