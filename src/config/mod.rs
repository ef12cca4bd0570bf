//! Configuration module for hwtune
//!
//! Provides configuration management including CLI arguments and the
//! engine configuration file.

mod engine;
mod settings;

pub use engine::*;
pub use settings::*;
