//! Profile application
//!
//! Pushes a stored profile's settings into every managed subsystem, one
//! subsystem at a time in the fixed apply order. Each subsystem is backed
//! up, merged, validated and activated independently: a failure is recorded
//! in the report and the run moves on to the next subsystem.

use super::backup::BackupGuard;
use super::lock::ApplyLock;
use super::service::{Activation, ServiceControl};
use super::surface::ConfigSurface;
use super::syntax::ConfigDocument;
use crate::error::{Result, TuneError};
use crate::profile::{ProfileStore, Setting, Subsystem, TuningProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default pause after activating a subsystem
pub const DEFAULT_STABILIZATION: Duration = Duration::from_secs(10);

/// Timestamp format used in backup file names
const BACKUP_STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// Process exit status when some subsystems failed to apply
pub const EXIT_PARTIAL: i32 = 2;

/// Process exit status for a hard failure
pub const EXIT_FAILURE: i32 = 1;

/// Result of applying one subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemStatus {
    /// Configuration is in place and the service was activated if needed
    Succeeded,
    /// Backup, validation or activation failed
    Failed,
    /// No configuration surface is registered for the subsystem
    Skipped,
}

impl fmt::Display for SubsystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsystemStatus::Succeeded => f.pad("succeeded"),
            SubsystemStatus::Failed => f.pad("failed"),
            SubsystemStatus::Skipped => f.pad("skipped"),
        }
    }
}

/// Overall result of an apply run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Every attempted subsystem succeeded; the profile is now active
    Success,
    /// Some subsystems failed; the active profile is unchanged
    PartialSuccess,
    /// Every attempted subsystem failed
    Failed,
}

impl ApplyOutcome {
    /// Operator exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            ApplyOutcome::Success => 0,
            ApplyOutcome::PartialSuccess => EXIT_PARTIAL,
            ApplyOutcome::Failed => EXIT_FAILURE,
        }
    }
}

/// Exit status of an `apply` command
///
/// 0 when every subsystem succeeded, [`EXIT_PARTIAL`] when some failed and
/// [`EXIT_FAILURE`] for any error, including a run where all failed.
pub fn apply_exit_code(result: &Result<ApplyReport>) -> i32 {
    match result {
        Ok(report) => report.outcome.exit_code(),
        Err(TuneError::ApplyFailed { report }) => report.outcome.exit_code(),
        Err(_) => EXIT_FAILURE,
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Success => f.pad("success"),
            ApplyOutcome::PartialSuccess => f.pad("partial_success"),
            ApplyOutcome::Failed => f.pad("failed"),
        }
    }
}

/// Per-subsystem line of an [`ApplyReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemReport {
    /// Subsystem this line describes
    pub subsystem: Subsystem,
    /// What happened to it
    pub status: SubsystemStatus,
    /// Keys whose rendered value differed from the existing configuration
    pub changed_keys: Vec<String>,
    /// Whether the original configuration was put back after a failure
    pub rolled_back: bool,
    /// Backup written before any change
    pub backup_path: Option<PathBuf>,
    /// How the service was activated, if it was
    pub activation: Option<Activation>,
    /// Failure description
    pub error: Option<String>,
}

impl SubsystemReport {
    fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            status: SubsystemStatus::Succeeded,
            changed_keys: Vec::new(),
            rolled_back: false,
            backup_path: None,
            activation: None,
            error: None,
        }
    }

    fn skipped(subsystem: Subsystem) -> Self {
        tracing::warn!(subsystem = %subsystem, "No configuration surface registered, skipping");
        Self {
            status: SubsystemStatus::Skipped,
            ..Self::new(subsystem)
        }
    }

    fn failed(mut self, error: TuneError, rolled_back: bool) -> Self {
        tracing::warn!(
            subsystem = %self.subsystem,
            rolled_back,
            "Subsystem apply failed: {}",
            error
        );
        self.status = SubsystemStatus::Failed;
        self.rolled_back = rolled_back;
        self.error = Some(error.to_string());
        self
    }
}

/// Structured outcome of an apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Profile that was applied
    pub profile_name: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// One entry per subsystem with settings, in apply order
    pub subsystems: Vec<SubsystemReport>,
    /// Overall result
    pub outcome: ApplyOutcome,
}

impl ApplyReport {
    fn outcome_of(subsystems: &[SubsystemReport]) -> ApplyOutcome {
        let attempted = subsystems
            .iter()
            .filter(|r| r.status != SubsystemStatus::Skipped)
            .count();
        let failed = subsystems
            .iter()
            .filter(|r| r.status == SubsystemStatus::Failed)
            .count();

        if failed == 0 {
            ApplyOutcome::Success
        } else if failed == attempted {
            ApplyOutcome::Failed
        } else {
            ApplyOutcome::PartialSuccess
        }
    }

    /// Report line for a subsystem
    pub fn subsystem(&self, subsystem: Subsystem) -> Option<&SubsystemReport> {
        self.subsystems.iter().find(|r| r.subsystem == subsystem)
    }

    /// Subsystems that failed
    pub fn failures(&self) -> impl Iterator<Item = &SubsystemReport> {
        self.subsystems
            .iter()
            .filter(|r| r.status == SubsystemStatus::Failed)
    }

    /// Total number of changed keys across subsystems
    pub fn total_changes(&self) -> usize {
        self.subsystems.iter().map(|r| r.changed_keys.len()).sum()
    }

    /// Print the per-subsystem status table
    pub fn print_table(&self) {
        println!("\n=== Apply Report: {} ===", self.profile_name);
        println!(
            "{:<12} {:<10} {:>7}  {:<11} {}",
            "SUBSYSTEM", "STATUS", "CHANGES", "ROLLED BACK", "DETAIL"
        );
        for r in &self.subsystems {
            let detail = match (&r.error, r.activation) {
                (Some(error), _) => error.clone(),
                (None, Some(activation)) => activation.to_string(),
                (None, None) if r.status == SubsystemStatus::Succeeded => "unchanged".to_string(),
                (None, None) => String::new(),
            };
            println!(
                "{:<12} {:<10} {:>7}  {:<11} {}",
                r.subsystem.name(),
                r.status,
                r.changed_keys.len(),
                if r.rolled_back { "yes" } else { "no" },
                detail
            );
        }
        println!("Outcome:  {}", self.outcome);
        println!(
            "Duration: {:.2?}",
            (self.finished_at - self.started_at)
                .to_std()
                .unwrap_or_default()
        );
    }
}

/// Applies stored profiles to the managed subsystems
pub struct ProfileApplier {
    store: Arc<ProfileStore>,
    services: Arc<dyn ServiceControl>,
    surfaces: BTreeMap<Subsystem, Box<dyn ConfigSurface>>,
    stabilization: Duration,
}

impl ProfileApplier {
    /// Create an applier with no registered surfaces
    pub fn new(store: Arc<ProfileStore>, services: Arc<dyn ServiceControl>) -> Self {
        Self {
            store,
            services,
            surfaces: BTreeMap::new(),
            stabilization: DEFAULT_STABILIZATION,
        }
    }

    /// Register the configuration surface of a subsystem
    pub fn with_surface(mut self, surface: Box<dyn ConfigSurface>) -> Self {
        self.surfaces.insert(surface.subsystem(), surface);
        self
    }

    /// Set the pause after each activation
    pub fn with_stabilization(mut self, stabilization: Duration) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Load a profile from the store and apply it
    pub fn apply_named(&self, name: &str) -> Result<ApplyReport> {
        let profile = self.store.load(name)?;
        self.apply(&profile)
    }

    /// Apply a stored profile
    ///
    /// Returns the report on full or partial success. The active profile
    /// changes only when no subsystem failed. If every attempted subsystem
    /// failed the report is returned inside [`TuneError::ApplyFailed`].
    pub fn apply(&self, profile: &TuningProfile) -> Result<ApplyReport> {
        if !self.store.exists(&profile.name) {
            return Err(TuneError::ProfileNotFound(profile.name.clone()));
        }
        if self.surfaces.is_empty() {
            return Err(TuneError::config("no configuration surfaces registered"));
        }

        let _lock = ApplyLock::acquire(&self.store.lock_path())?;

        let started_at = Utc::now();
        let stamp = started_at.format(BACKUP_STAMP_FORMAT).to_string();
        // Unchanged subsystems still need activating until the profile is active
        let already_active = self.store.get_active()?.as_deref() == Some(profile.name.as_str());
        tracing::info!(profile = %profile.name, tier = %profile.server_tier, "Applying profile");

        let mut subsystems = Vec::new();
        for subsystem in Subsystem::ALL {
            let settings = profile.settings_for(subsystem);
            if settings.is_empty() {
                continue;
            }

            let report = match self.surfaces.get(&subsystem) {
                Some(surface) => {
                    self.apply_subsystem(surface.as_ref(), settings, &stamp, already_active)
                }
                None => SubsystemReport::skipped(subsystem),
            };
            subsystems.push(report);
        }

        let outcome = ApplyReport::outcome_of(&subsystems);
        let report = ApplyReport {
            profile_name: profile.name.clone(),
            started_at,
            finished_at: Utc::now(),
            subsystems,
            outcome,
        };

        match outcome {
            ApplyOutcome::Success => {
                self.store.set_active(&profile.name)?;
                tracing::info!(
                    profile = %profile.name,
                    changes = report.total_changes(),
                    "Profile applied"
                );
                Ok(report)
            }
            ApplyOutcome::PartialSuccess => {
                tracing::warn!(
                    profile = %profile.name,
                    failed = report.failures().count(),
                    "Profile partially applied, active profile unchanged"
                );
                Ok(report)
            }
            ApplyOutcome::Failed => Err(TuneError::ApplyFailed {
                report: Box::new(report),
            }),
        }
    }

    fn apply_subsystem(
        &self,
        surface: &dyn ConfigSurface,
        settings: &[Setting],
        stamp: &str,
        already_active: bool,
    ) -> SubsystemReport {
        let subsystem = surface.subsystem();
        let mut report = SubsystemReport::new(subsystem);

        let guard = match BackupGuard::acquire(surface, &self.store.backups_dir(), stamp) {
            Ok(guard) => guard,
            Err(e) => return report.failed(e, false),
        };
        report.backup_path = Some(guard.backup_path().to_path_buf());

        let mut document =
            ConfigDocument::parse(surface.syntax().clone(), guard.original().unwrap_or_default());
        report.changed_keys = document.merge(subsystem, settings);

        if report.changed_keys.is_empty() {
            guard.commit();
            if already_active && self.services.is_running(subsystem) {
                tracing::info!(subsystem = %subsystem, "Configuration already up to date");
                return report;
            }
            tracing::info!(subsystem = %subsystem, "Configuration up to date, activating service");
        } else {
            if let Err(e) = surface
                .write(&document.render())
                .and_then(|()| surface.validate())
            {
                let rolled_back = match guard.restore() {
                    Ok(()) => true,
                    Err(restore_err) => {
                        tracing::error!(subsystem = %subsystem, "Rollback failed: {}", restore_err);
                        false
                    }
                };
                return report.failed(e, rolled_back);
            }
            guard.commit();

            tracing::debug!(
                subsystem = %subsystem,
                location = %surface.location(),
                keys = ?report.changed_keys,
                "Configuration written"
            );
        }

        let activation = match Activation::for_subsystem(subsystem) {
            Activation::Reload if self.services.is_running(subsystem) => Activation::Reload,
            _ => Activation::Restart,
        };
        report.activation = Some(activation);

        let activated = match activation {
            Activation::Reload => self.services.reload(subsystem),
            Activation::Restart => self.services.restart(subsystem),
        };
        if let Err(e) = activated {
            return report.failed(e, false);
        }

        if !self.stabilization.is_zero() {
            tracing::debug!(
                subsystem = %subsystem,
                wait = %humantime::format_duration(self.stabilization),
                "Waiting for subsystem to stabilize"
            );
            std::thread::sleep(self.stabilization);
        }

        tracing::info!(
            subsystem = %subsystem,
            changes = report.changed_keys.len(),
            %activation,
            "Subsystem applied"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ConfigSyntax;
    use crate::profile::{generate_profile, keys};
    use crate::system::HardwareProfile;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Shared = Arc<Mutex<Option<String>>>;

    struct MemorySurface {
        subsystem: Subsystem,
        syntax: ConfigSyntax,
        contents: Shared,
        reject: bool,
    }

    impl ConfigSurface for MemorySurface {
        fn subsystem(&self) -> Subsystem {
            self.subsystem
        }
        fn syntax(&self) -> &ConfigSyntax {
            &self.syntax
        }
        fn location(&self) -> String {
            format!("memory:{}", self.subsystem)
        }
        fn read(&self) -> Result<Option<String>> {
            Ok(self.contents.lock().unwrap().clone())
        }
        fn write(&self, contents: &str) -> Result<()> {
            *self.contents.lock().unwrap() = Some(contents.to_string());
            Ok(())
        }
        fn remove(&self) -> Result<()> {
            *self.contents.lock().unwrap() = None;
            Ok(())
        }
        fn validate(&self) -> Result<()> {
            if self.reject {
                Err(TuneError::validation(self.subsystem, "rejected"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct FakeServices {
        calls: Mutex<Vec<(Subsystem, Activation)>>,
        failing: Vec<Subsystem>,
        stopped: Vec<Subsystem>,
    }

    impl FakeServices {
        fn record(&self, subsystem: Subsystem, activation: Activation) -> Result<()> {
            self.calls.lock().unwrap().push((subsystem, activation));
            if self.failing.contains(&subsystem) {
                Err(TuneError::reload(subsystem, "unit failed"))
            } else {
                Ok(())
            }
        }
    }

    impl ServiceControl for FakeServices {
        fn is_running(&self, subsystem: Subsystem) -> bool {
            !self.stopped.contains(&subsystem)
        }
        fn reload(&self, subsystem: Subsystem) -> Result<()> {
            self.record(subsystem, Activation::Reload)
        }
        fn restart(&self, subsystem: Subsystem) -> Result<()> {
            self.record(subsystem, Activation::Restart)
        }
    }

    fn syntax_for(subsystem: Subsystem) -> ConfigSyntax {
        match subsystem {
            Subsystem::WebServer | Subsystem::Cache => ConfigSyntax::SpaceSeparated,
            Subsystem::Runtime => ConfigSyntax::Ini { section: "www".into() },
            Subsystem::Database => ConfigSyntax::Ini { section: "mysqld".into() },
            Subsystem::Kernel => ConfigSyntax::KeyEquals,
        }
    }

    struct Harness {
        _dir: TempDir,
        store: Arc<ProfileStore>,
        services: Arc<FakeServices>,
        contents: BTreeMap<Subsystem, Shared>,
        applier: ProfileApplier,
        profile: TuningProfile,
    }

    fn harness(rejecting: &[Subsystem], services: FakeServices) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ProfileStore::open(dir.path()).unwrap());
        let profile = generate_profile(&HardwareProfile::new(4, 8192, 100), "auto");
        store.save(&profile).unwrap();

        let services = Arc::new(services);
        let mut applier = ProfileApplier::new(store.clone(), services.clone())
            .with_stabilization(Duration::ZERO);
        let mut contents = BTreeMap::new();

        for subsystem in Subsystem::ALL {
            let shared: Shared = Arc::new(Mutex::new(Some("# managed\n".to_string())));
            contents.insert(subsystem, shared.clone());
            applier = applier.with_surface(Box::new(MemorySurface {
                subsystem,
                syntax: syntax_for(subsystem),
                contents: shared,
                reject: rejecting.contains(&subsystem),
            }));
        }

        Harness {
            _dir: dir,
            store,
            services,
            contents,
            applier,
            profile,
        }
    }

    /// A second applier over the same store and surfaces
    fn applier_over(h: &Harness, services: Arc<FakeServices>) -> ProfileApplier {
        let applier =
            ProfileApplier::new(h.store.clone(), services).with_stabilization(Duration::ZERO);
        Subsystem::ALL.iter().fold(applier, |a, s| {
            a.with_surface(Box::new(MemorySurface {
                subsystem: *s,
                syntax: syntax_for(*s),
                contents: h.contents[s].clone(),
                reject: false,
            }))
        })
    }

    fn text(h: &Harness, subsystem: Subsystem) -> String {
        h.contents[&subsystem].lock().unwrap().clone().unwrap_or_default()
    }

    #[test]
    fn test_full_success_sets_active() {
        let h = harness(&[], FakeServices::default());
        let report = h.applier.apply(&h.profile).unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Success);
        assert_eq!(report.subsystems.len(), 5);
        assert!(report
            .subsystems
            .iter()
            .all(|r| r.status == SubsystemStatus::Succeeded && r.backup_path.is_some()));
        assert_eq!(h.store.get_active().unwrap().as_deref(), Some("auto"));

        assert!(text(&h, Subsystem::WebServer).contains("maxConnections 10000"));
        assert!(text(&h, Subsystem::Database).contains("[mysqld]\ninnodb_buffer_pool_size = 5734M"));
        assert!(text(&h, Subsystem::Cache).contains("maxmemory 1638mb"));
        assert!(text(&h, Subsystem::Kernel).contains("net.core.somaxconn = 10000"));
        assert!(text(&h, Subsystem::Runtime).starts_with("# managed\n"));
    }

    #[test]
    fn test_activation_order_and_modes() {
        let h = harness(&[], FakeServices::default());
        h.applier.apply(&h.profile).unwrap();

        let calls = h.services.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (Subsystem::WebServer, Activation::Reload),
                (Subsystem::Runtime, Activation::Reload),
                (Subsystem::Database, Activation::Restart),
                (Subsystem::Cache, Activation::Restart),
                (Subsystem::Kernel, Activation::Reload),
            ]
        );
    }

    #[test]
    fn test_stopped_service_is_restarted() {
        let services = FakeServices {
            stopped: vec![Subsystem::WebServer],
            ..Default::default()
        };
        let h = harness(&[], services);
        let report = h.applier.apply(&h.profile).unwrap();

        assert_eq!(
            report.subsystem(Subsystem::WebServer).unwrap().activation,
            Some(Activation::Restart)
        );
    }

    #[test]
    fn test_second_apply_is_idempotent() {
        let h = harness(&[], FakeServices::default());
        h.applier.apply(&h.profile).unwrap();
        let before: Vec<String> = Subsystem::ALL.iter().map(|s| text(&h, *s)).collect();
        let calls_before = h.services.calls.lock().unwrap().len();

        let report = h.applier.apply(&h.profile).unwrap();
        assert_eq!(report.outcome, ApplyOutcome::Success);
        assert_eq!(report.total_changes(), 0);

        let after: Vec<String> = Subsystem::ALL.iter().map(|s| text(&h, *s)).collect();
        assert_eq!(before, after);
        assert_eq!(h.services.calls.lock().unwrap().len(), calls_before);
    }

    #[test]
    fn test_database_validation_failure_is_partial() {
        let h = harness(&[Subsystem::Database], FakeServices::default());
        let report = h.applier.apply(&h.profile).unwrap();

        assert_eq!(report.outcome, ApplyOutcome::PartialSuccess);
        let db = report.subsystem(Subsystem::Database).unwrap();
        assert_eq!(db.status, SubsystemStatus::Failed);
        assert!(db.rolled_back);
        assert!(db.error.as_deref().unwrap().contains("rejected"));

        // Database configuration equals its backup
        assert_eq!(text(&h, Subsystem::Database), "# managed\n");
        let backup = std::fs::read_to_string(db.backup_path.as_ref().unwrap()).unwrap();
        assert_eq!(backup, "# managed\n");

        for s in [Subsystem::WebServer, Subsystem::Runtime, Subsystem::Cache, Subsystem::Kernel] {
            assert_eq!(report.subsystem(s).unwrap().status, SubsystemStatus::Succeeded);
        }
        assert_eq!(h.store.get_active().unwrap(), None);

        // Database is never activated
        let calls = h.services.calls.lock().unwrap();
        assert!(calls.iter().all(|(s, _)| *s != Subsystem::Database));
    }

    #[test]
    fn test_partial_keeps_previous_active() {
        let h = harness(&[], FakeServices::default());
        h.applier.apply(&h.profile).unwrap();

        let bigger = generate_profile(&HardwareProfile::new(8, 16384, 200), "big");
        h.store.save(&bigger).unwrap();

        let failing = FakeServices {
            failing: vec![Subsystem::Cache],
            ..Default::default()
        };
        let applier = applier_over(&h, Arc::new(failing));

        let report = applier.apply(&bigger).unwrap();
        assert_eq!(report.outcome, ApplyOutcome::PartialSuccess);

        // Reload failure leaves the new configuration and the backup in place
        let cache = report.subsystem(Subsystem::Cache).unwrap();
        assert!(!cache.rolled_back);
        assert!(cache.backup_path.as_ref().unwrap().exists());
        assert!(text(&h, Subsystem::Cache).contains("maxmemory 3276mb"));

        assert_eq!(h.store.get_active().unwrap().as_deref(), Some("auto"));
    }

    #[test]
    fn test_retry_after_activation_failure_activates() {
        let failing = FakeServices {
            failing: vec![Subsystem::Cache],
            ..Default::default()
        };
        let h = harness(&[], failing);
        let first = h.applier.apply(&h.profile).unwrap();
        assert_eq!(first.outcome, ApplyOutcome::PartialSuccess);
        assert_eq!(h.store.get_active().unwrap(), None);

        // Files already match, but nothing has loaded them as the active profile
        let healthy = Arc::new(FakeServices::default());
        let report = applier_over(&h, healthy.clone()).apply(&h.profile).unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Success);
        assert_eq!(report.total_changes(), 0);
        let cache = report.subsystem(Subsystem::Cache).unwrap();
        assert_eq!(cache.activation, Some(Activation::Restart));
        assert!(healthy
            .calls
            .lock()
            .unwrap()
            .contains(&(Subsystem::Cache, Activation::Restart)));
        assert_eq!(h.store.get_active().unwrap().as_deref(), Some("auto"));
    }

    #[test]
    fn test_unchanged_stopped_service_is_restarted() {
        let h = harness(&[], FakeServices::default());
        h.applier.apply(&h.profile).unwrap();

        let services = Arc::new(FakeServices {
            stopped: vec![Subsystem::WebServer],
            ..Default::default()
        });
        let report = applier_over(&h, services.clone()).apply(&h.profile).unwrap();

        assert_eq!(report.total_changes(), 0);
        assert_eq!(
            *services.calls.lock().unwrap(),
            vec![(Subsystem::WebServer, Activation::Restart)]
        );
        assert_eq!(report.subsystem(Subsystem::Kernel).unwrap().activation, None);
    }

    #[test]
    fn test_exit_codes() {
        let h = harness(&[], FakeServices::default());
        let success = h.applier.apply(&h.profile);
        assert_eq!(apply_exit_code(&success), 0);

        let partial = harness(&[Subsystem::Database], FakeServices::default());
        let result = partial.applier.apply(&partial.profile);
        assert_eq!(apply_exit_code(&result), EXIT_PARTIAL);

        let failed = harness(&Subsystem::ALL, FakeServices::default());
        let result = failed.applier.apply(&failed.profile);
        assert!(matches!(result, Err(TuneError::ApplyFailed { .. })));
        assert_eq!(apply_exit_code(&result), EXIT_FAILURE);

        let missing = h.applier.apply_named("missing");
        assert_eq!(apply_exit_code(&missing), EXIT_FAILURE);
    }

    #[test]
    fn test_all_failed_is_error() {
        let h = harness(&Subsystem::ALL, FakeServices::default());
        match h.applier.apply(&h.profile) {
            Err(TuneError::ApplyFailed { report }) => {
                assert_eq!(report.outcome, ApplyOutcome::Failed);
                assert_eq!(report.failures().count(), 5);
            }
            other => panic!("expected ApplyFailed, got {other:?}"),
        }
        assert_eq!(h.store.get_active().unwrap(), None);
    }

    #[test]
    fn test_missing_surface_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ProfileStore::open(dir.path()).unwrap());
        let profile = generate_profile(&HardwareProfile::new(2, 2048, 20), "small");
        store.save(&profile).unwrap();

        let shared: Shared = Arc::new(Mutex::new(None));
        let applier = ProfileApplier::new(store.clone(), Arc::new(FakeServices::default()))
            .with_stabilization(Duration::ZERO)
            .with_surface(Box::new(MemorySurface {
                subsystem: Subsystem::Kernel,
                syntax: ConfigSyntax::KeyEquals,
                contents: shared.clone(),
                reject: false,
            }));

        let report = applier.apply(&profile).unwrap();
        assert_eq!(report.outcome, ApplyOutcome::Success);
        assert_eq!(
            report.subsystem(Subsystem::Cache).unwrap().status,
            SubsystemStatus::Skipped
        );
        let kernel = shared.lock().unwrap().clone().unwrap();
        assert!(kernel.contains(&format!("{} = 10", keys::KERNEL_SWAPPINESS)));
    }

    #[test]
    fn test_concurrent_apply_rejected() {
        let h = harness(&[], FakeServices::default());
        let _held = ApplyLock::acquire(&h.store.lock_path()).unwrap();

        assert!(matches!(
            h.applier.apply(&h.profile),
            Err(TuneError::ApplyInProgress(_))
        ));
        assert_eq!(text(&h, Subsystem::WebServer), "# managed\n");
    }

    #[test]
    fn test_unknown_profile() {
        let h = harness(&[], FakeServices::default());
        assert!(matches!(
            h.applier.apply_named("missing"),
            Err(TuneError::ProfileNotFound(_))
        ));
    }
}
