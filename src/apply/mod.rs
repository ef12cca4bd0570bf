//! Profile application
//!
//! Applies tuning profiles to managed subsystems with scoped backups,
//! native-syntax merging, validation and service activation.

mod applier;
mod backup;
mod lock;
mod service;
mod surface;
mod syntax;

pub use applier::*;
pub use backup::BackupGuard;
pub use lock::ApplyLock;
pub use service::*;
pub use surface::*;
pub use syntax::*;
