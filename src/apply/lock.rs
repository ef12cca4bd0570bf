//! Host-wide apply lock
//!
//! Only one apply run may mutate subsystem configuration at a time, across
//! processes. On Unix this is an advisory `flock` on the store's lock file,
//! released automatically when the process exits.

use crate::error::{IoResultExt, Result, TuneError};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Exclusive lock held for the duration of an apply run
pub struct ApplyLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<std::fs::File>,
}

impl ApplyLock {
    /// Take the lock without waiting
    ///
    /// Fails with [`TuneError::ApplyInProgress`] if another run holds it.
    #[cfg(unix)]
    pub fn acquire(path: &Path) -> Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_path(path)?;

        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                TuneError::ApplyInProgress(path.to_path_buf())
            } else {
                TuneError::io(path, std::io::Error::from(errno))
            }
        })?;

        tracing::debug!(lock = %path.display(), "Acquired apply lock");
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Take the lock without waiting
    ///
    /// Fails with [`TuneError::ApplyInProgress`] if another run holds it.
    #[cfg(not(unix))]
    pub fn acquire(path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(Self {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(TuneError::ApplyInProgress(path.to_path_buf()))
            }
            Err(e) => Err(TuneError::io(path, e)),
        }
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ApplyLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyLock").field("path", &self.path).finish()
    }
}

#[cfg(not(unix))]
impl Drop for ApplyLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apply.lock");

        let held = ApplyLock::acquire(&path).unwrap();
        match ApplyLock::acquire(&path) {
            Err(TuneError::ApplyInProgress(p)) => assert_eq!(p, path),
            other => panic!("expected ApplyInProgress, got {other:?}"),
        }

        drop(held);
        assert!(ApplyLock::acquire(&path).is_ok());
    }
}
