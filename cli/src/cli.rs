//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;
use crate::domain::{BrokerError, ConfigError, PoolError};

/// Exit status for configuration errors, detected before any side effect.
pub const EXIT_CONFIG: u8 = 2;

/// Exit status for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Keep a pool of self-hosted CI runners registered and supervised
#[derive(Parser)]
#[command(
    name = "paco",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Config file (default: ~/.paco/config.yaml)
    #[arg(long, global = true, env = "PACO_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase diagnostic log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write unit definitions and register every instance
    Install,

    /// Start all instances and the group unit
    Start,

    /// Stop all instances, escalating to SIGKILL after the grace period
    Stop(commands::stop::StopArgs),

    /// Send SIGKILL to every instance immediately
    Kill,

    /// Show the state of every unit in the pool
    Status,

    /// Show supervisor logs for one instance or the whole pool
    Logs(commands::logs::LogsArgs),

    /// Stop, deregister and remove the pool
    Uninstall(commands::uninstall::UninstallArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails before producing a report.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            config,
            verbose: _,
            command,
        } = self;
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            config,
        })?;

        match command {
            Command::Install => commands::install::run(&app).await,
            Command::Start => commands::start::run(&app).await,
            Command::Stop(args) => commands::stop::run(&app, &args).await,
            Command::Kill => commands::kill::run(&app).await,
            Command::Status => commands::status::run(&app).await,
            Command::Logs(args) => commands::logs::run(&app, args).await,
            Command::Uninstall(args) => commands::uninstall::run(&app, &args).await,
        }
    }
}

/// Exit status for an error that aborted a command.
#[must_use]
pub fn failure_code(err: &anyhow::Error) -> u8 {
    let is_config = err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<PoolError>(), Some(PoolError::Config(_)));
    if is_config { EXIT_CONFIG } else { EXIT_FAILURE }
}

/// Stable machine-readable code for the `--json` error object.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if failure_code(err) == EXIT_CONFIG {
        return "config_invalid";
    }
    let broker = err.downcast_ref::<BrokerError>().or_else(|| match err.downcast_ref::<PoolError>() {
        Some(PoolError::Broker(b)) => Some(b),
        _ => None,
    });
    match (broker, err.downcast_ref::<PoolError>()) {
        (Some(BrokerError::UnsupportedTarget { .. }), _) => "unsupported_target",
        (Some(BrokerError::Unavailable { .. }), _) => "token_broker_unavailable",
        (None, Some(PoolError::AllInstancesFailed { .. })) => "all_instances_failed",
        (None, Some(PoolError::UnitRegistration(_))) => "unit_registration_failed",
        _ => "error",
    }
}
