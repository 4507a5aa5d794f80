//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the output context and the host adapters that do not
//! depend on the pool configuration. `PoolSession` adds the validated
//! configuration and the adapters derived from it.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::services::config_service::resolve_config;
use crate::application::services::pool::{PoolOrchestrator, PoolPorts};
use crate::domain::{PoolConfig, Timeouts};
use crate::infra::agent::RunnerAgent;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::control_plane::HttpControlPlane;
use crate::infra::fs::LocalInstanceFs;
use crate::infra::process::PkillSignaller;
use crate::infra::systemd::SystemdSupervisor;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Explicit `--config` path.
    pub config: Option<PathBuf>,
}

/// The orchestrator wired to production adapters.
pub type ProductionPool<'a> = PoolOrchestrator<
    'a,
    HttpControlPlane,
    SystemdSupervisor<TokioCommandRunner>,
    RunnerAgent<TokioCommandRunner>,
    LocalInstanceFs,
    PkillSignaller<TokioCommandRunner>,
>;

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    pub config_store: YamlConfigStore,
    pub supervisor: SystemdSupervisor<TokioCommandRunner>,
    pub fs: LocalInstanceFs,
    pub processes: PkillSignaller<TokioCommandRunner>,
    pub timeouts: Timeouts,
    /// When `true`, skip interactive prompts.
    ///
    /// Set when the `CI` or `PACO_YES` environment variables are present.
    pub non_interactive: bool,
}

/// Validated configuration plus the adapters that depend on it.
pub struct PoolSession {
    pub config: PoolConfig,
    control_plane: HttpControlPlane,
    agent: RunnerAgent<TokioCommandRunner>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if no config path can be determined (home directory
    /// not found and no override given).
    pub fn new(flags: AppFlags) -> Result<Self> {
        let non_interactive = std::env::var("CI").is_ok() || std::env::var("PACO_YES").is_ok();
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // JSON mode keeps stdout for the single JSON document.
        let quiet = flags.output.quiet || flags.output.json;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            config_store: YamlConfigStore::locate(flags.config)?,
            supervisor: SystemdSupervisor::default(),
            fs: LocalInstanceFs,
            processes: PkillSignaller::default(),
            timeouts: Timeouts::default(),
            non_interactive,
        })
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Load and validate the configuration and build the config-dependent
    /// adapters. Resolution warnings are shown to the user.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` (exit code 2) for any validation failure.
    pub fn open_pool(&self) -> Result<PoolSession> {
        let resolution = resolve_config(&self.config_store, &self.fs)?;
        for warning in &resolution.warnings {
            self.output.warn(warning);
        }
        let config = resolution.config;
        let control_plane = HttpControlPlane::new(&config.api_url, self.timeouts.token_fetch)?;
        let agent = RunnerAgent::new(
            TokioCommandRunner::default(),
            config.run_as_user.clone(),
            self.timeouts.agent_call,
        );
        Ok(PoolSession {
            config,
            control_plane,
            agent,
        })
    }

    /// The orchestrator for `session`, sharing this context's adapters.
    #[must_use]
    pub fn orchestrator<'a>(&'a self, session: &'a PoolSession) -> ProductionPool<'a> {
        PoolOrchestrator::new(
            &session.config,
            PoolPorts {
                control_plane: &session.control_plane,
                supervisor: &self.supervisor,
                agent: &session.agent,
                fs: &self.fs,
                processes: &self.processes,
            },
            self.timeouts,
        )
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI or `PACO_YES` env), returns
    /// `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
