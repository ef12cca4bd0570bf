//! Benchmarking
//!
//! Repeatable load tests that validate an applied profile, with the
//! external tools behind typed adapter interfaces.

mod database;
mod load;
mod runner;

pub use database::*;
pub use load::*;
pub use runner::*;
