//! Scoped configuration backups
//!
//! A [`BackupGuard`] snapshots a surface before it is mutated and puts the
//! snapshot back when dropped, unless the change was committed. Every early
//! return or panic in the apply path therefore leaves the subsystem as it
//! was found.

use super::surface::ConfigSurface;
use crate::error::{IoResultExt, Result, TuneError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Restores a configuration surface on drop unless committed
pub struct BackupGuard<'a> {
    surface: &'a dyn ConfigSurface,
    /// Contents before mutation; `None` if the configuration did not exist
    original: Option<String>,
    backup_path: PathBuf,
    armed: bool,
}

impl<'a> BackupGuard<'a> {
    /// Snapshot `surface` into `backups_dir`
    ///
    /// The backup file is `<subsystem>-<stamp>.bak` and is fsynced before
    /// this returns. A missing configuration is recorded as an empty backup
    /// and is removed again on restore.
    pub fn acquire(surface: &'a dyn ConfigSurface, backups_dir: &Path, stamp: &str) -> Result<Self> {
        let original = surface.read()?;
        let (mut file, backup_path) = create_backup_file(backups_dir, surface, stamp)?;

        file.write_all(original.as_deref().unwrap_or("").as_bytes())
            .with_path(&backup_path)?;
        file.sync_all().with_path(&backup_path)?;

        tracing::debug!(
            subsystem = %surface.subsystem(),
            backup = %backup_path.display(),
            existed = original.is_some(),
            "Backed up configuration"
        );

        Ok(Self {
            surface,
            original,
            backup_path,
            armed: true,
        })
    }

    /// Contents captured before mutation
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Location of the backup file
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Keep the new configuration; the backup file is retained
    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.backup_path)
    }

    /// Put the original configuration back now
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.put_back()
    }

    fn put_back(&self) -> Result<()> {
        match &self.original {
            Some(contents) => self.surface.write(contents)?,
            None => self.surface.remove()?,
        }
        tracing::info!(
            subsystem = %self.surface.subsystem(),
            location = %self.surface.location(),
            "Restored configuration from backup"
        );
        Ok(())
    }
}

impl Drop for BackupGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.put_back() {
                tracing::error!(
                    subsystem = %self.surface.subsystem(),
                    backup = %self.backup_path.display(),
                    "Failed to restore configuration: {}",
                    e
                );
            }
        }
    }
}

fn create_backup_file(
    backups_dir: &Path,
    surface: &dyn ConfigSurface,
    stamp: &str,
) -> Result<(std::fs::File, PathBuf)> {
    std::fs::create_dir_all(backups_dir).with_path(backups_dir)?;

    // Two runs inside the same millisecond get distinct names
    for attempt in 0..100u32 {
        let name = if attempt == 0 {
            format!("{}-{}.bak", surface.subsystem(), stamp)
        } else {
            format!("{}-{}.{}.bak", surface.subsystem(), stamp, attempt)
        };
        let path = backups_dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(TuneError::io(path, e)),
        }
    }

    Err(TuneError::io(
        backups_dir,
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "no free backup name"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{ConfigSyntax, FileSurface};
    use crate::profile::Subsystem;
    use std::fs;
    use tempfile::TempDir;

    const STAMP: &str = "20260101T000000.000";

    fn setup(contents: Option<&str>) -> (TempDir, FileSurface) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redis.conf");
        if let Some(c) = contents {
            fs::write(&path, c).unwrap();
        }
        let surface = FileSurface::new(Subsystem::Cache, path, ConfigSyntax::SpaceSeparated);
        (dir, surface)
    }

    #[test]
    fn test_backup_written_before_mutation() {
        let (dir, surface) = setup(Some("maxmemory 100mb\n"));
        let backups = dir.path().join("backups");

        let guard = BackupGuard::acquire(&surface, &backups, STAMP).unwrap();
        assert_eq!(guard.original(), Some("maxmemory 100mb\n"));
        assert_eq!(
            guard.backup_path(),
            backups.join("cache-20260101T000000.000.bak")
        );
        assert_eq!(
            fs::read_to_string(guard.backup_path()).unwrap(),
            "maxmemory 100mb\n"
        );

        let kept = guard.commit();
        assert!(kept.exists());
    }

    #[test]
    fn test_drop_restores_unless_committed() {
        let (dir, surface) = setup(Some("maxmemory 100mb\n"));
        let backups = dir.path().join("backups");

        {
            let _guard = BackupGuard::acquire(&surface, &backups, STAMP).unwrap();
            surface.write("maxmemory 9999mb\n").unwrap();
        }
        assert_eq!(surface.read().unwrap().as_deref(), Some("maxmemory 100mb\n"));

        {
            let guard = BackupGuard::acquire(&surface, &backups, STAMP).unwrap();
            surface.write("maxmemory 1638mb\n").unwrap();
            guard.commit();
        }
        assert_eq!(surface.read().unwrap().as_deref(), Some("maxmemory 1638mb\n"));
    }

    #[test]
    fn test_restore_removes_created_config() {
        let (dir, surface) = setup(None);
        let guard = BackupGuard::acquire(&surface, &dir.path().join("backups"), STAMP).unwrap();
        assert_eq!(guard.original(), None);

        surface.write("maxmemory 64mb\n").unwrap();
        guard.restore().unwrap();
        assert_eq!(surface.read().unwrap(), None);
    }

    #[test]
    fn test_same_stamp_gets_unique_names() {
        let (dir, surface) = setup(Some("x 1\n"));
        let backups = dir.path().join("backups");

        let first = BackupGuard::acquire(&surface, &backups, STAMP).unwrap().commit();
        let second = BackupGuard::acquire(&surface, &backups, STAMP).unwrap().commit();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }
}
