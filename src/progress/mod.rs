//! Progress reporting module
//!
//! Provides terminal progress display for benchmark runs.

mod reporter;

pub use reporter::*;
