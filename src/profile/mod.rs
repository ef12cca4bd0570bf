//! Tuning profiles
//!
//! Provides the profile data model, the deterministic generator that
//! derives profiles from hardware, and the durable profile store.

mod generator;
mod store;
mod types;

pub use generator::*;
pub use store::{CurrentProfileState, ProfileStore};
pub use types::*;
