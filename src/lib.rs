//! `agent-config` - A configuration editor for an unattended data-collection agent
//!
//! This library renders the agent's deployment settings as a set of forms
//! built from a declarative schema, validates submitted values and writes
//! them back to the INI configuration documents, the environment file, deploy
//! keys and the data source sidecar.

pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod operations;
pub mod store;
pub mod system;
pub mod utils;

use anyhow::{Context as _, Result};
use chrono::Utc;
use cli::{Args, SubmitArgs, parse_field_args};
use config::Options;
use config::validation::validate_options;
use error::AgentConfigError;
use form::FormRegistry;
use form::body::{expand_fields, overlay};
use operations::{
    EditOperation, EditOutcome, OutputFormat, StatusOperation, format_output,
};
use serde_json::{Map, Value};
use system::System;
use tracing::{debug, info};

/// Load options from the options file, the environment and the command line
///
/// # Errors
///
/// Returns an error if the options file cannot be parsed or the resulting
/// options are invalid.
pub fn load_options(args: &Args, system: &dyn System) -> Result<Options> {
    let mut options = Options::load(system, Some(args.options.as_path()))?;
    args.apply_overrides(&mut options);
    validate_options(&options)?;
    debug!("Using options {:?}", options);
    Ok(options)
}

/// Run the show command
///
/// # Errors
///
/// Returns an error if the options, the form schema or a configuration
/// document cannot be loaded.
pub fn run_show(args: &Args, format: OutputFormat, system: &dyn System) -> Result<()> {
    let options = load_options(args, system)?;
    let registry = FormRegistry::load(system, options.form.as_deref())?;
    let forms = EditOperation::new(system, &options, &registry).show()?;

    // Output to stdout (not using logging)
    println!("{}", format_output(&forms, format)?);
    Ok(())
}

/// Run the submit command
///
/// An invalid submission prints the forms with their errors and fails with a
/// validation error; nothing is written in that case.
///
/// # Errors
///
/// Returns an error if the body cannot be read, the submission is invalid,
/// or the configuration cannot be written.
pub fn run_submit(args: &Args, submit: &SubmitArgs, system: &dyn System) -> Result<()> {
    let format = submit
        .format
        .parse::<OutputFormat>()
        .map_err(AgentConfigError::configuration)?;
    let options = load_options(args, system)?;
    let registry = FormRegistry::load(system, options.form.as_deref())?;
    let body = read_body(submit, system)?;

    match EditOperation::new(system, &options, &registry).submit(&body)? {
        EditOutcome::Saved(written) => {
            for path in &written {
                debug!("Updated {}", path.display());
            }
            info!("Configuration saved ({} files)", written.len());
            Ok(())
        }
        EditOutcome::Invalid(forms) => {
            println!("{}", format_output(&forms, format)?);
            Err(AgentConfigError::validation(
                "Submission has invalid fields; nothing was written",
            )
            .into())
        }
    }
}

/// Run the status command
///
/// # Errors
///
/// Returns an error if the options cannot be loaded or a status file
/// cannot be read.
pub fn run_status(args: &Args, format: OutputFormat, system: &dyn System) -> Result<()> {
    let options = load_options(args, system)?;
    let status = StatusOperation::new(system, &options).execute(Utc::now())?;

    println!("{}", format_output(&status, format)?);
    Ok(())
}

/// Assemble the submitted body from the body file and `--field` arguments
///
/// # Errors
///
/// Returns an error if the body file cannot be read or is not a JSON object,
/// a field argument is malformed, or nothing was submitted.
pub fn read_body(submit: &SubmitArgs, system: &dyn System) -> Result<Map<String, Value>> {
    let mut body = match submit.body.as_ref() {
        Some(path) => {
            let content = system
                .read_to_string(path)
                .with_context(|| format!("Failed to read body file: {}", path.display()))?;
            match serde_json::from_str(&content) {
                Ok(Value::Object(body)) => body,
                Ok(_) => {
                    return Err(AgentConfigError::validation(format!(
                        "Body file {} must contain a JSON object",
                        path.display()
                    ))
                    .into());
                }
                Err(e) => {
                    return Err(AgentConfigError::validation(format!(
                        "Failed to parse body file {} at line {}, column {}: {e}",
                        path.display(),
                        e.line(),
                        e.column()
                    ))
                    .into());
                }
            }
        }
        None => Map::new(),
    };

    let fields = parse_field_args(&submit.fields)?;
    overlay(
        &mut body,
        expand_fields(fields.iter().map(|(name, value)| (name.as_str(), value.as_str())))?,
    );

    if body.is_empty() {
        return Err(
            AgentConfigError::validation("Nothing submitted; use --body or --field").into(),
        );
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockSystem;
    use serde_json::json;
    use std::path::PathBuf;

    fn submit_args(body: Option<&str>, fields: &[&str]) -> SubmitArgs {
        SubmitArgs {
            body: body.map(PathBuf::from),
            fields: fields.iter().map(|f| (*f).to_owned()).collect(),
            format: "json".to_owned(),
        }
    }

    #[test]
    fn test_read_body_merges_fields_over_file() {
        let system =
            MockSystem::new().with_file("/work/body.json", br#"{"jira_key": "ABC"}"#);
        let submit = submit_args(
            Some("/work/body.json"),
            &["version_control_1[version_control_domain]=gitlab.example"],
        );

        let body = read_body(&submit, &system).unwrap();
        assert_eq!(
            Value::Object(body),
            json!({
                "jira_key": "ABC",
                "version_control_1": {"version_control_domain": "gitlab.example"}
            })
        );
    }

    #[test]
    fn test_read_body_fields_replace_file_values() {
        let system = MockSystem::new().with_file("/work/body.json", br#"{"jira_key": "OLD"}"#);
        let submit = submit_args(Some("/work/body.json"), &["jira_key=NEW"]);

        let body = read_body(&submit, &system).unwrap();
        assert_eq!(body["jira_key"], json!("NEW"));

        let submit = submit_args(None, &["jira_key=A", "jira_key=B"]);
        let body = read_body(&submit, &system).unwrap();
        assert_eq!(body["jira_key"], json!(["A", "B"]));
    }

    #[test]
    fn test_read_body_rejects_non_object() {
        let system = MockSystem::new().with_file("/work/body.json", b"[1, 2]");
        let err = read_body(&submit_args(Some("/work/body.json"), &[]), &system).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON object"));
    }

    #[test]
    fn test_read_body_requires_input() {
        let system = MockSystem::new();
        let err = read_body(&submit_args(None, &[]), &system).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AgentConfigError>().map(AgentConfigError::exit_code),
            Some(2)
        );
    }
}
