//! Configuration surfaces
//!
//! A configuration surface is where a managed subsystem reads its tuned
//! settings from. The applier only talks to the [`ConfigSurface`] trait so
//! tests can substitute in-memory fakes.

use super::syntax::ConfigSyntax;
use crate::error::{IoResultExt, Result, TuneError};
use crate::profile::Subsystem;
use crate::system::command::{failure_message, run_command};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Readable, writable and validatable configuration of one subsystem
pub trait ConfigSurface: Send + Sync {
    /// Subsystem this surface configures
    fn subsystem(&self) -> Subsystem;

    /// Native syntax of the configuration
    fn syntax(&self) -> &ConfigSyntax;

    /// Human readable location, for logs and reports
    fn location(&self) -> String;

    /// Current contents, or `None` if the configuration does not exist yet
    fn read(&self) -> Result<Option<String>>;

    /// Replace the contents
    fn write(&self, contents: &str) -> Result<()>;

    /// Remove the configuration entirely
    fn remove(&self) -> Result<()>;

    /// Ask the subsystem whether the current contents are acceptable
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// [`ConfigSurface`] backed by a file on disk
#[derive(Debug, Clone)]
pub struct FileSurface {
    subsystem: Subsystem,
    path: PathBuf,
    syntax: ConfigSyntax,
    validate_command: Option<Vec<String>>,
}

impl FileSurface {
    /// Create a surface for `path`
    pub fn new(subsystem: Subsystem, path: impl Into<PathBuf>, syntax: ConfigSyntax) -> Self {
        Self {
            subsystem,
            path: path.into(),
            syntax,
            validate_command: None,
        }
    }

    /// Validate with an external command (program followed by arguments)
    pub fn with_validate_command(mut self, command: Vec<String>) -> Self {
        self.validate_command = if command.is_empty() { None } else { Some(command) };
        self
    }

    /// Path of the configuration file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSurface for FileSurface {
    fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    fn syntax(&self) -> &ConfigSyntax {
        &self.syntax
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TuneError::io(&self.path, e)),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.path.with_file_name(format!(".{}.hwtune-tmp", file_name));

        {
            let mut file = fs::File::create(&tmp).with_path(&tmp)?;
            file.write_all(contents.as_bytes()).with_path(&tmp)?;
            file.sync_all().with_path(&tmp)?;
        }

        // Keep the original mode and ownership bits where possible
        if let Ok(meta) = fs::metadata(&self.path) {
            fs::set_permissions(&tmp, meta.permissions()).with_path(&tmp)?;
        }

        fs::rename(&tmp, &self.path).with_path(&self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TuneError::io(&self.path, e)),
        }
    }

    fn validate(&self) -> Result<()> {
        let Some(command) = &self.validate_command else {
            return Ok(());
        };

        let (program, args) = command
            .split_first()
            .ok_or_else(|| TuneError::config("empty validation command"))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = run_command(program, &args)
            .map_err(|e| TuneError::validation(self.subsystem, e.to_string()))?;

        if output.status.success() {
            tracing::debug!(subsystem = %self.subsystem, "Configuration validated");
            Ok(())
        } else {
            Err(TuneError::validation(self.subsystem, failure_message(&output)))
        }
    }
}
