//! Durable profile storage
//!
//! Persists named tuning profiles, the single active-profile pointer, the
//! append-only benchmark log and the backups area under one state
//! directory:
//!
//! ```text
//! <state_dir>/
//!   profiles/<name>.json
//!   current_profile.json
//!   benchmarks.jsonl
//!   backups/
//!   apply.lock
//! ```

use super::types::{ProfileSummary, TuningProfile};
use crate::bench::BenchmarkResult;
use crate::error::{IoResultExt, Result, TuneError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const PROFILES_DIR: &str = "profiles";
const BACKUPS_DIR: &str = "backups";
const CURRENT_FILE: &str = "current_profile.json";
const BENCHMARKS_FILE: &str = "benchmarks.jsonl";
const LOCK_FILE: &str = "apply.lock";

/// Pointer to the profile last applied successfully
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentProfileState {
    /// Active profile name, if any profile has been applied
    pub active_profile_name: Option<String>,
    /// When the active profile was set
    pub activated_at: Option<DateTime<Utc>>,
}

/// File-backed store for profiles and engine state
#[derive(Debug)]
pub struct ProfileStore {
    /// Root state directory
    root: PathBuf,
    /// Guards writes to the active-profile pointer
    active: RwLock<()>,
}

impl ProfileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [root.join(PROFILES_DIR), root.join(BACKUPS_DIR)] {
            fs::create_dir_all(&dir).with_path(&dir)?;
        }

        Ok(Self {
            root,
            active: RwLock::new(()),
        })
    }

    /// Root state directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding per-apply subsystem backups
    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    /// Host-wide apply lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Append-only benchmark log
    pub fn benchmarks_path(&self) -> PathBuf {
        self.root.join(BENCHMARKS_FILE)
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.root.join(PROFILES_DIR).join(format!("{}.json", name))
    }

    fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    /// Persist a profile, replacing any record with the same name
    pub fn save(&self, profile: &TuningProfile) -> Result<()> {
        validate_name(&profile.name)?;
        profile.check_bounds()?;

        let path = self.profile_path(&profile.name);
        write_json_atomic(&path, profile)?;

        tracing::info!(profile = %profile.name, tier = %profile.server_tier, "Saved profile");
        Ok(())
    }

    /// Load a profile by name
    pub fn load(&self, name: &str) -> Result<TuningProfile> {
        validate_name(name).map_err(|_| TuneError::ProfileNotFound(name.to_string()))?;

        let path = self.profile_path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TuneError::ProfileNotFound(name.to_string()))
            }
            Err(e) => return Err(TuneError::io(path, e)),
        };

        let profile: TuningProfile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| TuneError::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(profile)
    }

    /// Whether a profile with this name exists
    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.profile_path(name).is_file()
    }

    /// Summaries of all stored profiles, sorted by name
    pub fn list(&self) -> Result<Vec<ProfileSummary>> {
        let dir = self.root.join(PROFILES_DIR);
        let mut summaries = Vec::new();

        for entry in fs::read_dir(&dir).with_path(&dir)? {
            let path = entry.with_path(&dir)?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load(name) {
                Ok(profile) => summaries.push(profile.summary()),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable profile"),
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Remove a stored profile. The active profile cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(TuneError::ProfileNotFound(name.to_string()));
        }
        if self.get_active()?.as_deref() == Some(name) {
            return Err(TuneError::ProfileInUse(name.to_string()));
        }

        let path = self.profile_path(name);
        fs::remove_file(&path).with_path(&path)?;
        tracing::info!(profile = name, "Deleted profile");
        Ok(())
    }

    /// Full active-profile record
    pub fn active_state(&self) -> Result<CurrentProfileState> {
        let _guard = self
            .active
            .read()
            .map_err(|_| TuneError::config("active profile lock poisoned"))?;

        let path = self.current_path();
        match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .map_err(|e| TuneError::Serialization(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(CurrentProfileState::default())
            }
            Err(e) => Err(TuneError::io(path, e)),
        }
    }

    /// Name of the active profile, if any
    pub fn get_active(&self) -> Result<Option<String>> {
        Ok(self.active_state()?.active_profile_name)
    }

    /// Point the active profile at an existing stored profile
    pub fn set_active(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(TuneError::ProfileNotFound(name.to_string()));
        }

        let _guard = self
            .active
            .write()
            .map_err(|_| TuneError::config("active profile lock poisoned"))?;

        let state = CurrentProfileState {
            active_profile_name: Some(name.to_string()),
            activated_at: Some(Utc::now()),
        };
        write_json_atomic(&self.current_path(), &state)?;

        tracing::info!(profile = name, "Active profile updated");
        Ok(())
    }

    /// Append a benchmark result to the log
    pub fn append_benchmark(&self, result: &BenchmarkResult) -> Result<()> {
        let path = self.benchmarks_path();
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_path(&path)?;
        file.write_all(&line).with_path(&path)?;
        file.sync_data().with_path(&path)?;
        Ok(())
    }

    /// Read benchmark results, optionally filtered by profile
    pub fn benchmarks(&self, profile: Option<&str>) -> Result<Vec<BenchmarkResult>> {
        let path = self.benchmarks_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TuneError::io(path, e)),
        };

        let mut results = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_path(&path)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BenchmarkResult>(&line) {
                Ok(result) => {
                    if profile.map_or(true, |p| p == result.profile_name) {
                        results.push(result);
                    }
                }
                // A torn final line from a crash must not hide earlier records
                Err(e) => tracing::warn!(line = index + 1, error = %e, "Skipping malformed benchmark record"),
            }
        }

        Ok(results)
    }
}

/// Profile names become file names, so keep them to a safe alphabet
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(TuneError::InvalidProfileName(name.to_string()))
    }
}

/// Write JSON to a temp file, fsync it, then rename over the target
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    {
        let file = File::create(&temp_path).with_path(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().with_path(&temp_path)?;
        writer
            .get_ref()
            .sync_all()
            .with_path(&temp_path)?;
    }

    fs::rename(&temp_path, path).with_path(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{generate_profile, ServerTier};
    use crate::system::HardwareProfile;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProfileStore) {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn profile(name: &str) -> TuningProfile {
        generate_profile(&HardwareProfile::new(4, 8192, 100), name)
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        let original = profile("auto");
        store.save(&original).unwrap();

        let loaded = store.load("auto").unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_profile() {
        let (_dir, store) = store();
        assert!(matches!(store.load("nope"), Err(TuneError::ProfileNotFound(_))));
        assert!(matches!(store.load("../etc/passwd"), Err(TuneError::ProfileNotFound(_))));
    }

    #[test]
    fn test_save_rejects_bad_names() {
        let (_dir, store) = store();
        for name in ["", "../escape", "a/b", ".hidden", "sp ace"] {
            let p = profile(name);
            assert!(matches!(store.save(&p), Err(TuneError::InvalidProfileName(_))), "{}", name);
        }
    }

    #[test]
    fn test_save_rejects_out_of_bounds() {
        let (_dir, store) = store();
        let mut p = profile("bad");
        p.settings.get_mut(&crate::profile::Subsystem::WebServer).unwrap()[0].value =
            crate::profile::SettingValue::Integer(200_000);

        assert!(matches!(store.save(&p), Err(TuneError::BoundsViolation { .. })));
        assert!(!store.exists("bad"));
    }

    #[test]
    fn test_regenerate_overwrites() {
        let (_dir, store) = store();
        store.save(&profile("auto")).unwrap();

        let smaller = generate_profile(&HardwareProfile::new(1, 1024, 20), "auto");
        store.save(&smaller).unwrap();

        assert_eq!(store.load("auto").unwrap().server_tier, ServerTier::Small);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_sorted_and_ignores_temp_files() {
        let (dir, store) = store();
        store.save(&profile("zeta")).unwrap();
        store.save(&profile("alpha")).unwrap();
        fs::write(dir.path().join("profiles/partial.tmp"), b"{ half").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_active_pointer() {
        let (_dir, store) = store();
        assert_eq!(store.get_active().unwrap(), None);

        assert!(matches!(store.set_active("auto"), Err(TuneError::ProfileNotFound(_))));
        assert_eq!(store.get_active().unwrap(), None);

        store.save(&profile("auto")).unwrap();
        store.set_active("auto").unwrap();
        assert_eq!(store.get_active().unwrap().as_deref(), Some("auto"));
        assert!(store.active_state().unwrap().activated_at.is_some());
    }

    #[test]
    fn test_active_pointer_survives_reopen() {
        let (dir, store) = store();
        store.save(&profile("auto")).unwrap();
        store.set_active("auto").unwrap();
        drop(store);

        let reopened = ProfileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_active().unwrap().as_deref(), Some("auto"));
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = store();
        store.save(&profile("old")).unwrap();
        store.save(&profile("live")).unwrap();
        store.set_active("live").unwrap();

        assert!(matches!(store.delete("live"), Err(TuneError::ProfileInUse(_))));
        store.delete("old").unwrap();
        assert!(!store.exists("old"));
        assert!(matches!(store.delete("old"), Err(TuneError::ProfileNotFound(_))));
    }
}
