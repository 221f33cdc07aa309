//! Status report of the agent

use crate::config::Options;
use crate::store::{StoreName, Storage, has_value};
use crate::system::System;
use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

const UNKNOWN_VERSION: &str = "unknown";
const PREFLIGHT_FILE: &str = "preflight_date.txt";

/// How long ago the agent last collected data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// No project has been scraped, or one of them never was
    Never,
    /// Earliest scrape is more than a day old
    Old,
    Recent,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::Old => f.write_str("old"),
            Self::Recent => f.write_str("recent"),
        }
    }
}

/// Summary shown on the agent's front page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub configured: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,
    pub scrape_date: Option<DateTime<Utc>>,
    pub freshness: Freshness,
}

/// Computes the agent status from the settings and export directories
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "StatusOperation")]
pub struct StatusOperation<'src> {
    storage: Storage<'src>,
}

impl<'src> StatusOperation<'src> {
    #[must_use]
    #[inline]
    pub const fn new(system: &'src dyn System, options: &'src Options) -> Self {
        Self {
            storage: Storage::new(system, options),
        }
    }

    /// Status as of `now`
    ///
    /// # Errors
    ///
    /// Returns an error if the settings or version file exists but cannot be read.
    #[inline]
    pub fn execute(&self, now: DateTime<Utc>) -> Result<AgentStatus> {
        let system = self.storage.system();
        let options = self.storage.options();

        let projects = self.projects()?;
        let configured = projects
            .as_ref()
            .and_then(|keys| keys.first())
            .is_some_and(|first| has_value(Some(first)));

        let scrape_date = match projects {
            Some(keys) if configured => self.earliest_scrape(&keys)?,
            _ => None,
        };

        let version_path = self.storage.version_path();
        let version = if system.is_file(&version_path) {
            system
                .read_to_string(&version_path)
                .with_context(|| format!("Failed to read {}", version_path.display()))?
                .trim()
                .to_owned()
        } else {
            UNKNOWN_VERSION.to_owned()
        };

        Ok(AgentStatus {
            configured,
            version,
            ssh_host: has_value(Some(&options.ssh_host)).then(|| options.ssh_host.clone()),
            scrape_date,
            freshness: freshness(scrape_date, now),
        })
    }

    /// Project keys, or `None` when there are no settings
    fn projects(&self) -> Result<Option<Vec<String>>> {
        let path = self.storage.document_path(StoreName::Settings);
        if !self.storage.system().exists(&path) {
            debug!("No settings at {}", path.display());
            return Ok(None);
        }
        let settings = self.storage.load(StoreName::Settings)?;
        Ok(Some(
            settings
                .keys("projects")
                .into_iter()
                .map(str::to_owned)
                .collect(),
        ))
    }

    /// Earliest scrape over all projects; `None` if any project lacks one
    fn earliest_scrape(&self, projects: &[String]) -> Result<Option<DateTime<Utc>>> {
        let system = self.storage.system();
        let mut earliest: Option<DateTime<Utc>> = None;
        for project in projects {
            let path = self.storage.project_export_path(project).join(PREFLIGHT_FILE);
            if !system.is_file(&path) {
                debug!("Project {} has not been scraped", project);
                return Ok(None);
            }
            let content = system
                .read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let Some(date) = parse_scrape_date(&content) else {
                warn!("Unreadable scrape date in {}", path.display());
                return Ok(None);
            };
            earliest = Some(earliest.map_or(date, |current| current.min(date)));
        }
        Ok(earliest)
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` with an optional `+ZZZZ` offset; no offset means UTC
#[must_use]
pub fn parse_scrape_date(content: &str) -> Option<DateTime<Utc>> {
    let content = content.trim();
    DateTime::parse_from_str(content, "%Y-%m-%d %H:%M:%S%z")
        .map(|date| date.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(content, "%Y-%m-%d %H:%M:%S").map(|date| date.and_utc())
        })
        .ok()
}

/// Freshness of a scrape date; whole days are counted
#[must_use]
pub fn freshness(scrape_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
    match scrape_date {
        None => Freshness::Never,
        Some(date) if (now - date).num_days() > 1 => Freshness::Old,
        Some(_) => Freshness::Recent,
    }
}
