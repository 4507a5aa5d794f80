//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`: never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use futures_util::stream::BoxStream;
use paco_common::InstanceStatus;

use crate::domain::{
    AgentError, Credential, Labels, PoolConfigFile, RegistrationToken, Signal, UnitDefinition,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<Output>;
    /// Spawn a program with piped stdout without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child>;
}

// ── Control Plane Port ────────────────────────────────────────────────────────

/// Raw reply from the control plane; interpretation is the broker's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Authenticated HTTP access to the remote job-dispatch control plane.
#[allow(async_fn_in_trait)]
pub trait ControlPlane {
    /// `POST {api}/{path}` with a bearer credential and an empty body.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures; non-2xx statuses come
    /// back as `Ok`.
    async fn post(&self, path: &str, credential: &Credential) -> Result<HttpReply>;
}

// ── Supervisor Port ───────────────────────────────────────────────────────────

/// Whether `register` had to rewrite the stored definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitChange {
    Unchanged,
    Written,
}

/// Filters for [`Supervisor::logs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Keep streaming new lines.
    pub follow: bool,
    /// Only the last N lines of history.
    pub lines: Option<u32>,
    /// Only lines newer than this (supervisor time syntax, e.g. `"1 hour ago"`).
    pub since: Option<String>,
}

/// Lazily produced log lines.
pub type LogStream = BoxStream<'static, Result<String>>;

/// The host process-supervision facility. The manager never execs the agent
/// itself; every start, stop and kill goes through here.
#[allow(async_fn_in_trait)]
pub trait Supervisor {
    /// Store a unit definition, replacing any previous one wholesale.
    async fn register(&self, unit: &UnitDefinition) -> Result<UnitChange>;
    /// Make the supervisor pick up definitions written by `register`/`unregister`.
    async fn reload(&self) -> Result<()>;
    /// Delete a stored definition. Returns `false` if none existed.
    async fn unregister(&self, name: &str) -> Result<bool>;
    async fn start(&self, name: &str) -> Result<()>;
    /// Request a normal stop and wait at most `timeout` for it.
    async fn stop(&self, name: &str, timeout: Duration) -> Result<()>;
    /// Send `signal` to every process of the unit, bypassing the stop path.
    async fn kill(&self, name: &str, signal: Signal) -> Result<()>;
    async fn status(&self, name: &str) -> Result<InstanceStatus>;
    /// Persist the unit across host restarts.
    async fn enable(&self, name: &str) -> Result<()>;
    async fn disable(&self, name: &str) -> Result<()>;
    /// Stream log lines of the given units.
    ///
    /// # Errors
    ///
    /// Returns an error if the log reader cannot be started.
    fn logs(&self, names: &[String], options: &LogOptions) -> Result<LogStream>;
}

// ── Agent CLI Port ────────────────────────────────────────────────────────────

/// Arguments of one agent `configure` call.
#[derive(Debug)]
pub struct AgentRegistration<'a> {
    pub url: &'a str,
    pub token: &'a RegistrationToken,
    pub name: &'a str,
    pub labels: &'a Labels,
    pub group: Option<&'a str>,
    pub work_dir: &'a Path,
    /// Replace a live registration with the same name instead of failing.
    pub replace: bool,
}

/// The third-party worker agent's own configuration commands.
#[allow(async_fn_in_trait)]
pub trait AgentCli {
    async fn configure(&self, registration: &AgentRegistration<'_>) -> Result<(), AgentError>;
    async fn remove(&self, work_dir: &Path, token: &RegistrationToken) -> Result<(), AgentError>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Local on-disk state of runner instances.
pub trait InstanceFs {
    /// Whether the agent's identity files exist in `work_dir`.
    fn has_identity(&self, work_dir: &Path) -> bool;
    /// Delete identity files and the agent's work directory. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be removed.
    fn clear_identity(&self, work_dir: &Path) -> Result<()>;
    /// Count `{pool_name}-runner-{n}` directories under `root`.
    fn count_instance_dirs(&self, pool_name: &str, root: &Path) -> usize;
}

// ── Process Port ──────────────────────────────────────────────────────────────

/// Signals stray processes outside the supervisor's control.
#[allow(async_fn_in_trait)]
pub trait ProcessSignaller {
    /// Send SIGTERM to every process whose command line matches `pattern`.
    /// Returns `true` if anything matched.
    async fn terminate_matching(&self, pattern: &str) -> Result<bool>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Loads the persisted pool configuration document.
pub trait ConfigStore {
    /// Load the document; a missing file yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<PoolConfigFile>;
    fn path(&self) -> PathBuf;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
