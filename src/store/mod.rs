//! Persistent configuration stores
//!
//! Reads and writes the `settings` and `credentials` documents, key files
//! and the data source sidecar, all through the [`System`] abstraction.

pub mod document;
pub mod sources;

pub use document::{ConfigDocument, Section};
pub use sources::SourceDescriptor;

use crate::config::Options;
use crate::error::AgentConfigError;
use crate::system::System;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Token shown in place of a stored secret; submitting it keeps the secret
pub const EXISTING_VALUE: &str = "<existing>";

/// Value written for options that do not apply
pub const PLACEHOLDER: &str = "-";

const FALSY_VALUES: &[&str] = &["", "false", "no", "off", "-", "0"];

/// Whether a stored or submitted value counts as a real value
///
/// `None` stands for a missing option.
#[must_use]
#[inline]
pub fn has_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| !FALSY_VALUES.contains(&v))
}

/// The two named configuration documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreName {
    Settings,
    Credentials,
}

impl StoreName {
    /// File name of the document inside the configuration directory
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Settings => "settings.cfg",
            Self::Credentials => "credentials.cfg",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings => f.write_str("settings"),
            Self::Credentials => f.write_str("credentials"),
        }
    }
}

/// File locations of everything the editor reads and writes
pub struct Storage<'src> {
    system: &'src dyn System,
    options: &'src Options,
}

impl<'src> Storage<'src> {
    #[must_use]
    pub const fn new(system: &'src dyn System, options: &'src Options) -> Self {
        Self { system, options }
    }

    #[must_use]
    pub fn system(&self) -> &'src dyn System {
        self.system
    }

    #[must_use]
    pub fn options(&self) -> &'src Options {
        self.options
    }

    /// Path of a configuration document
    #[must_use]
    pub fn document_path(&self, store: StoreName) -> PathBuf {
        self.options.config_path.join(store.file_name())
    }

    /// Path of the generated environment file
    #[must_use]
    pub fn env_path(&self) -> PathBuf {
        self.options.config_path.join("env")
    }

    /// Path of the agent version file
    #[must_use]
    pub fn version_path(&self) -> PathBuf {
        self.options.config_path.join("VERSION")
    }

    /// Shared default deploy key
    #[must_use]
    pub fn default_key_path(&self) -> PathBuf {
        self.options.key_path.join("id_rsa")
    }

    /// Deploy key of one version control domain
    #[must_use]
    pub fn domain_key_path(&self, domain: &str) -> PathBuf {
        self.options.key_path.join(format!("source_{domain}"))
    }

    /// Export directory of a project
    #[must_use]
    pub fn project_export_path(&self, project: &str) -> PathBuf {
        self.options.export_path.join(project)
    }

    /// Data source sidecar of a project
    #[must_use]
    pub fn sources_path(&self, project: &str) -> PathBuf {
        self.project_export_path(project).join("data_sources.json")
    }

    /// Load a configuration document; a missing file yields an empty document
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self, store: StoreName) -> Result<ConfigDocument> {
        let path = self.document_path(store);
        if !self.system.exists(&path) {
            debug!("No {} document at {}", store, path.display());
            return Ok(ConfigDocument::new());
        }

        let content = self.system.read_to_string(&path).map_err(|e| {
            AgentConfigError::filesystem(format!(
                "Failed to read {} document {}: {e}",
                store,
                path.display()
            ))
        })?;
        Ok(ConfigDocument::parse(&content))
    }

    /// Read the data source sidecar of a project, if there is one
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be read or is not a JSON list
    /// of source descriptors.
    pub fn read_sources(&self, project: &str) -> Result<Option<Vec<SourceDescriptor>>> {
        let path = self.sources_path(project);
        if !self.system.exists(&path) {
            return Ok(None);
        }
        let content = self
            .system
            .read_to_string(&path)
            .with_context(|| format!("Failed to read data sources: {}", path.display()))?;
        let sources = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse data sources: {}", path.display()))?;
        Ok(Some(sources))
    }
}
