//! # `agent-config`
//!
//! `agent-config` edits the configuration of an unattended data-collection agent.
//! The configuration is presented as forms generated from a declarative schema;
//! submitted forms are validated and written back to the agent's INI documents,
//! environment file, deploy keys and data source sidecar.
//!
//! ## Usage
//!
//! **Show the current configuration:**
//! ```sh
//! agent-config --config-path /agent/config show --format yaml
//! ```
//!
//! **Submit changes:**
//! ```sh
//! agent-config submit --body body.json --field 'version_control_1[version_control_token]=<existing>'
//! ```
//!
//! **Report the agent status:**
//! ```sh
//! agent-config status
//! ```
//!
//! Exit codes: 1 configuration error, 2 invalid submission, 3 write error,
//! 4 filesystem error.

use anyhow::Result;
use agent_config::cli::{Args, Command};
use agent_config::error::AgentConfigError;
use agent_config::operations::OutputFormat;
use agent_config::system::real::RealSystem;
use clap::Parser as _;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber based on verbose flag
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let system = RealSystem::new();
    let result = match &args.command {
        Command::Show { format } => {
            agent_config::run_show(&args, parse_format(format), &system)
        }
        Command::Submit(submit) => agent_config::run_submit(&args, submit, &system),
        Command::Status { format } => {
            agent_config::run_status(&args, parse_format(format), &system)
        }
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("{}", err);
            std::process::exit(
                err.downcast_ref::<AgentConfigError>()
                    .map_or(1, AgentConfigError::exit_code),
            );
        }
    }
}

fn parse_format(format: &str) -> OutputFormat {
    format.parse::<OutputFormat>().unwrap_or_else(|err| {
        error!("{}", err);
        std::process::exit(1);
    })
}
