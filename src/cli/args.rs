use crate::config::Options;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for agent-config
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-config")]
#[command(about = "Edit the configuration of an unattended data-collection agent")]
#[command(long_about = None)]
#[command(version)]
pub struct Args {
    /// Options file (JSON); a missing file means defaults
    #[arg(
        long,
        value_name = "PATH",
        env = "AGENT_CONFIG_OPTIONS",
        default_value = "config.json",
        global = true
    )]
    pub options: PathBuf,

    /// Directory holding settings.cfg, credentials.cfg and env
    #[arg(long, value_name = "DIR", global = true)]
    pub config_path: Option<PathBuf>,

    /// Root of the per-project export directories
    #[arg(long, value_name = "DIR", global = true)]
    pub export_path: Option<PathBuf>,

    /// Directory holding deploy keys
    #[arg(long, value_name = "DIR", global = true)]
    pub key_path: Option<PathBuf>,

    /// Host the agent uploads to over SSH
    #[arg(long, value_name = "HOST", global = true)]
    pub ssh_host: Option<String>,

    /// Alternative form schema (YAML)
    #[arg(long, value_name = "PATH", global = true)]
    pub form: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the forms filled with the current configuration
    Show {
        /// Output format: json or yaml
        #[arg(long, value_name = "FORMAT", default_value = "json", value_parser = ["json", "yaml"])]
        format: String,
    },

    /// Validate a submission and write it to the configuration files
    Submit(SubmitArgs),

    /// Print whether the agent is configured and when it last collected data
    Status {
        /// Output format: json or yaml
        #[arg(long, value_name = "FORMAT", default_value = "json", value_parser = ["json", "yaml"])]
        format: String,
    },
}

/// Sources of a submitted body; a `--field` value replaces the same name in the body file
#[derive(Parser, Debug, Clone, Default)]
pub struct SubmitArgs {
    /// JSON object with the submitted form values
    #[arg(long, value_name = "FILE")]
    pub body: Option<PathBuf>,

    /// Flat form field in NAME=VALUE format, e.g. `version_control_1[version_control_domain]=gitlab.example`
    /// Can be specified multiple times; repeating a name creates a list
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Output format of the forms printed when the submission is invalid
    #[arg(long, value_name = "FORMAT", default_value = "json", value_parser = ["json", "yaml"])]
    pub format: String,
}

impl Args {
    /// Apply the command-line overrides to loaded options
    pub fn apply_overrides(&self, options: &mut Options) {
        if let Some(path) = self.config_path.as_ref() {
            options.config_path.clone_from(path);
        }
        if let Some(path) = self.export_path.as_ref() {
            options.export_path.clone_from(path);
        }
        if let Some(path) = self.key_path.as_ref() {
            options.key_path.clone_from(path);
        }
        if let Some(host) = self.ssh_host.as_ref() {
            options.ssh_host.clone_from(host);
        }
        if let Some(form) = self.form.as_ref() {
            options.form = Some(form.clone());
        }
    }
}

/// Split `--field` arguments into names and values
///
/// # Errors
///
/// Returns an error if an argument has no `=` or an empty name.
pub fn parse_field_args(field_args: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    field_args.iter().map(|arg| parse_key_value(arg)).collect()
}

/// Parse NAME=VALUE string
fn parse_key_value(arg: &str) -> anyhow::Result<(String, String)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(anyhow::anyhow!(
            "Invalid field format '{arg}'. Expected NAME=VALUE"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_fields() {
        let fields = vec![
            "jira_key=ABC".to_string(),
            "bigboat_url=http://b.example/?a=b".to_string(),
        ];
        let result = parse_field_args(&fields).unwrap();

        assert_eq!(
            result,
            vec![
                ("jira_key".to_string(), "ABC".to_string()),
                ("bigboat_url".to_string(), "http://b.example/?a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_empty_value() {
        let fields = vec!["quality_time_url=".to_string()];
        let result = parse_field_args(&fields).unwrap();
        assert_eq!(result[0], ("quality_time_url".to_string(), String::new()));
    }

    #[test]
    fn test_invalid_field_format() {
        for arg in ["invalid", "=value"] {
            let result = parse_field_args(&[arg.to_string()]);
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("Expected NAME=VALUE"));
        }
    }

    #[test]
    fn test_overrides_replace_options() {
        let args = Args::parse_from([
            "agent-config",
            "--config-path",
            "/etc/agent",
            "--ssh-host",
            "upload.example",
            "status",
        ]);
        let mut options = Options::rooted("/agent");
        args.apply_overrides(&mut options);

        assert_eq!(options.config_path, PathBuf::from("/etc/agent"));
        assert_eq!(options.export_path, PathBuf::from("/agent/export"));
        assert_eq!(options.ssh_host, "upload.example");
        assert!(matches!(args.command, Command::Status { .. }));
    }

    #[test]
    fn test_submit_collects_repeated_fields() {
        let args = Args::parse_from([
            "agent-config",
            "submit",
            "--field",
            "jira_key=ABC",
            "--field",
            "bigboat_key=k",
            "-v",
        ]);
        assert!(args.verbose);
        let Command::Submit(submit) = args.command else {
            panic!("expected submit");
        };
        assert_eq!(submit.fields.len(), 2);
        assert!(submit.body.is_none());
        assert_eq!(submit.format, "json");
    }
}
