//! Edit operation: show the current configuration as forms, or apply a submission

use crate::config::Options;
use crate::form::binder::derive_and_bind;
use crate::form::{FormRegistry, FormView, build_forms, derive_defaults, reduce, render};
use crate::operations::write::ConfigWriter;
use crate::store::{StoreName, Storage};
use crate::system::System;
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info};

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Every form was valid and these files were written
    Saved(Vec<PathBuf>),
    /// Some field failed validation; nothing was written
    Invalid(Vec<FormView>),
}

/// Loads both configuration documents for every call and writes them back
/// on a valid submission
///
/// Nothing is locked: two overlapping submissions both read the old
/// documents and the last one to commit wins.
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "EditOperation")]
pub struct EditOperation<'src> {
    storage: Storage<'src>,
    registry: &'src FormRegistry,
}

impl<'src> EditOperation<'src> {
    #[must_use]
    #[inline]
    pub const fn new(
        system: &'src dyn System,
        options: &'src Options,
        registry: &'src FormRegistry,
    ) -> Self {
        Self {
            storage: Storage::new(system, options),
            registry,
        }
    }

    /// Forms filled with the values derived from the stores
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration document cannot be read.
    #[inline]
    pub fn show(&self) -> Result<Vec<FormView>> {
        let settings = self.storage.load(StoreName::Settings)?;
        let credentials = self.storage.load(StoreName::Credentials)?;

        let mut forms = build_forms(self.registry, None, &credentials);
        derive_defaults(&mut forms, &settings, &credentials, &self.storage, self.registry);
        Ok(render(&forms))
    }

    /// Bind a submitted body and write it when every form is valid
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A configuration document cannot be read
    /// - A submitted domain or project key cannot be used as a file name
    /// - Any output file cannot be written
    #[inline]
    pub fn submit(&self, body: &Map<String, Value>) -> Result<EditOutcome> {
        let settings = self.storage.load(StoreName::Settings)?;
        let credentials = self.storage.load(StoreName::Credentials)?;

        let mut forms = build_forms(self.registry, Some(body), &credentials);
        derive_and_bind(
            &mut forms,
            body,
            &settings,
            &credentials,
            &self.storage,
            self.registry,
        );

        let reduction = reduce(&forms);
        if !reduction.all_valid {
            let invalid = forms.iter().filter(|form| !form.is_valid()).count();
            info!("Submission has errors in {} form(s)", invalid);
            return Ok(EditOutcome::Invalid(render(&forms)));
        }

        debug!("Submission valid, writing configuration");
        let writer = ConfigWriter::new(&self.storage, self.registry);
        let written = writer.write(&reduction.merged, &forms, &settings, &credentials)?;
        Ok(EditOutcome::Saved(written))
    }
}
