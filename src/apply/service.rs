//! Service control
//!
//! Reload and restart of managed subsystems after their configuration
//! changes. Service management itself is external; the engine only issues
//! commands through [`ServiceControl`].

use crate::error::{Result, TuneError};
use crate::profile::Subsystem;
use crate::system::command::{failure_message, run_command};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a subsystem picks up new configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Graceful reload of the running service
    Reload,
    /// Full stop/start
    Restart,
}

impl Activation {
    /// Activation mode used for a subsystem
    pub fn for_subsystem(subsystem: Subsystem) -> Self {
        match subsystem {
            Subsystem::WebServer | Subsystem::Runtime | Subsystem::Kernel => Activation::Reload,
            Subsystem::Database | Subsystem::Cache => Activation::Restart,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Reload => write!(f, "reload"),
            Activation::Restart => write!(f, "restart"),
        }
    }
}

/// Control over the services behind managed subsystems
pub trait ServiceControl: Send + Sync {
    /// Whether the subsystem's service is currently running
    fn is_running(&self, subsystem: Subsystem) -> bool;

    /// Gracefully reload configuration
    fn reload(&self, subsystem: Subsystem) -> Result<()>;

    /// Restart the service
    fn restart(&self, subsystem: Subsystem) -> Result<()>;
}

/// [`ServiceControl`] using `systemctl`, and `sysctl` for kernel parameters
#[derive(Debug, Clone)]
pub struct SystemdServiceControl {
    units: BTreeMap<Subsystem, String>,
}

impl SystemdServiceControl {
    /// Create with explicit unit names per subsystem
    pub fn new(units: BTreeMap<Subsystem, String>) -> Self {
        Self { units }
    }

    fn unit(&self, subsystem: Subsystem) -> Result<&str> {
        self.units
            .get(&subsystem)
            .map(String::as_str)
            .ok_or_else(|| TuneError::reload(subsystem, "no service unit configured"))
    }

    fn systemctl(&self, subsystem: Subsystem, action: &str) -> Result<()> {
        let unit = self.unit(subsystem)?;
        let output = run_command("systemctl", &[action, unit])
            .map_err(|e| TuneError::reload(subsystem, e.to_string()))?;

        if output.status.success() {
            tracing::info!(subsystem = %subsystem, unit, action, "Service activated");
            Ok(())
        } else {
            Err(TuneError::reload(
                subsystem,
                format!("systemctl {} {}: {}", action, unit, failure_message(&output)),
            ))
        }
    }

    fn apply_sysctl() -> Result<()> {
        let output = run_command("sysctl", &["--system"])
            .map_err(|e| TuneError::reload(Subsystem::Kernel, e.to_string()))?;
        if output.status.success() {
            tracing::info!("Kernel parameters reloaded");
            Ok(())
        } else {
            Err(TuneError::reload(Subsystem::Kernel, failure_message(&output)))
        }
    }
}

impl ServiceControl for SystemdServiceControl {
    fn is_running(&self, subsystem: Subsystem) -> bool {
        if subsystem == Subsystem::Kernel {
            return true;
        }
        let Ok(unit) = self.unit(subsystem) else {
            return false;
        };
        run_command("systemctl", &["is-active", "--quiet", unit])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn reload(&self, subsystem: Subsystem) -> Result<()> {
        match subsystem {
            Subsystem::Kernel => Self::apply_sysctl(),
            _ => self.systemctl(subsystem, "reload"),
        }
    }

    fn restart(&self, subsystem: Subsystem) -> Result<()> {
        match subsystem {
            Subsystem::Kernel => Self::apply_sysctl(),
            _ => self.systemctl(subsystem, "restart"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_modes() {
        assert_eq!(Activation::for_subsystem(Subsystem::WebServer), Activation::Reload);
        assert_eq!(Activation::for_subsystem(Subsystem::Runtime), Activation::Reload);
        assert_eq!(Activation::for_subsystem(Subsystem::Kernel), Activation::Reload);
        assert_eq!(Activation::for_subsystem(Subsystem::Database), Activation::Restart);
        assert_eq!(Activation::for_subsystem(Subsystem::Cache), Activation::Restart);
    }

    #[test]
    fn test_missing_unit_is_reload_error() {
        let control = SystemdServiceControl::new(BTreeMap::new());
        assert!(!control.is_running(Subsystem::Cache));
        assert!(matches!(
            control.restart(Subsystem::Cache),
            Err(TuneError::SubsystemReload { subsystem: Subsystem::Cache, .. })
        ));
    }

    #[test]
    fn test_kernel_always_running() {
        let control = SystemdServiceControl::new(BTreeMap::new());
        assert!(control.is_running(Subsystem::Kernel));
    }
}
