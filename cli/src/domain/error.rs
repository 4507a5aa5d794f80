//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use paco_common::{InstallReport, Tally as _};
use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Pre-flight configuration problems. Always fatal, raised before any remote
/// call or instance is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "No registration target configured. Set exactly one of registrationOrg, registrationUser or registrationRepoUrl."
    )]
    MissingTarget,

    #[error("Conflicting registration targets: {found}. Set exactly one.")]
    ConflictingTargets { found: String },

    #[error("instanceCount must be between {min} and {max}, got {count}")]
    InstanceCountOutOfRange { count: i64, min: u8, max: u8 },

    #[error(
        "instanceCount is not set and no existing runner directories were found under {root}"
    )]
    MissingInstanceCount { root: String },

    #[error("No credential configured. Set 'credential' in the config file.")]
    MissingCredential,

    #[error("Invalid pool name '{0}': must match ^[a-z0-9][a-z0-9-]{{0,31}}$")]
    InvalidPoolName(String),

    #[error("Invalid label '{0}': labels must not contain whitespace")]
    InvalidLabel(String),

    #[error("Invalid repository URL '{0}': expected <server>/<owner>/<repo>")]
    InvalidRepositoryUrl(String),

    #[error("Invalid restartPolicy '{0}': expected 'always' or 'never'")]
    InvalidRestartPolicy(String),

    #[error("Invalid {key} '{value}': expected an absolute path")]
    RelativePath { key: &'static str, value: String },

    #[error("Cannot load config file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

// ── Token broker errors ───────────────────────────────────────────────────────

/// Failures of a registration/removal token exchange.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// Transport failure, non-2xx status or an empty token. The broker never
    /// retries; the caller decides.
    #[error("token broker unavailable ({endpoint}): {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// The control plane has no token endpoint for this target kind.
    #[error("registration target {target} is not supported: the control plane issues no runner tokens for personal accounts")]
    UnsupportedTarget { target: String },
}

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Failures reported by the third-party runner agent CLI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The control plane rejected the token (HTTP 401/404); a fresh token may help.
    #[error("token rejected by control plane: {0}")]
    TokenRejected(String),

    #[error("agent command failed: {0}")]
    Failed(String),
}

// ── Per-instance errors ───────────────────────────────────────────────────────

/// Registration of one instance failed. Non-fatal to the pool.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("registration of {instance_name} failed: {cause}")]
pub struct RegistrationError {
    pub instance_name: String,
    pub cause: AgentError,
}

impl RegistrationError {
    /// Whether a re-fetched token is worth one more attempt.
    #[must_use]
    pub fn is_token_rejected(&self) -> bool {
        matches!(self.cause, AgentError::TokenRejected(_))
    }
}

/// A supervisor primitive failed for one unit. Recorded, never aborts a
/// pool-wide stop or kill.
#[derive(Debug, Error)]
#[error("supervisor {op} {unit} failed: {cause:#}")]
pub struct SupervisorError {
    pub unit: String,
    pub op: &'static str,
    pub cause: anyhow::Error,
}

/// Best-effort local or remote cleanup step that did not complete. Logged and
/// reported, never blocks forward progress.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{instance_name}: {stage}: {cause}")]
pub struct StaleStateCleanupError {
    pub instance_name: String,
    pub stage: CleanupStage,
    pub cause: String,
}

/// Which best-effort step a [`StaleStateCleanupError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    RemoteDeregistration,
    LocalIdentityRemoval,
    ProcessTermination,
    Quiesce,
}

impl std::fmt::Display for CleanupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RemoteDeregistration => "remote deregistration",
            Self::LocalIdentityRemoval => "local identity removal",
            Self::ProcessTermination => "process termination",
            Self::Quiesce => "stopping running unit",
        })
    }
}

// ── Pool errors ───────────────────────────────────────────────────────────────

/// Whole-operation failures of the pool orchestrator.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Carries the report so per-instance causes reach the user.
    #[error("all {} instances failed to register", report.total())]
    AllInstancesFailed { report: Box<InstallReport> },

    #[error("registering unit definitions failed: {0:#}")]
    UnitRegistration(anyhow::Error),
}
