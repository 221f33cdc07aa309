//! Application options
//!
//! Options come from an optional JSON file, are overridden by environment
//! variables and finally by command-line flags.

pub mod schema;
pub mod validation;

use crate::error::AgentConfigError;
use crate::system::System;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the editor reads and writes, and fixed values it writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Directory holding `settings.cfg`, `credentials.cfg`, `env` and `VERSION`
    pub config_path: PathBuf,

    /// Root of the per-project export directories
    pub export_path: PathBuf,

    /// Directory holding deploy keys
    pub key_path: PathBuf,

    /// Host the agent uploads to over SSH
    pub ssh_host: String,

    /// Certificate path written to the `ssh` settings section
    pub ssh_cert: String,

    /// Alternative form schema; the embedded schema is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config"),
            export_path: PathBuf::from("export"),
            key_path: PathBuf::from("keys"),
            ssh_host: String::new(),
            ssh_cert: "certs/wwwgros.crt".to_owned(),
            form: None,
        }
    }
}

/// Environment variables overriding file options
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("CONFIG_PATH", "config_path"),
    ("EXPORT_PATH", "export_path"),
    ("IDENTITY_PATH", "key_path"),
    ("SSH_HOST", "ssh_host"),
    ("SSH_CERT", "ssh_cert"),
    ("FORM_PATH", "form"),
];

impl Options {
    /// Options with all directories below one root
    #[must_use]
    pub fn rooted<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            config_path: root.join("config"),
            export_path: root.join("export"),
            key_path: root.join("keys"),
            ..Self::default()
        }
    }

    /// Load options from an optional JSON file and apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The options file exists but cannot be read or parsed
    /// - The resulting options are invalid
    pub fn load(system: &dyn System, path: Option<&Path>) -> Result<Self> {
        let mut options = match path {
            Some(path) if system.exists(path) => {
                let content = system
                    .read_to_string(path)
                    .with_context(|| format!("Failed to read options file: {}", path.display()))?;
                serde_json::from_str(&content).map_err(|e| {
                    AgentConfigError::configuration(format!(
                        "Failed to parse options file {}: {e}",
                        path.display()
                    ))
                })?
            }
            Some(path) => {
                debug!("No options file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        options.apply_env(system);
        validation::validate_options(&options)?;
        Ok(options)
    }

    /// Override options from environment variables
    pub fn apply_env(&mut self, system: &dyn System) {
        for &(variable, option) in ENV_OVERRIDES {
            if let Ok(value) = system.env_var(variable) {
                debug!("Option {} taken from ${}", option, variable);
                self.set(option, value);
            }
        }
    }

    fn set(&mut self, option: &str, value: String) {
        match option {
            "config_path" => self.config_path = PathBuf::from(value),
            "export_path" => self.export_path = PathBuf::from(value),
            "key_path" => self.key_path = PathBuf::from(value),
            "ssh_host" => self.ssh_host = value,
            "ssh_cert" => self.ssh_cert = value,
            "form" => self.form = Some(PathBuf::from(value)),
            _ => {}
        }
    }
}
