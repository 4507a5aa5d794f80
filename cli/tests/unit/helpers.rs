//! Shared stub infrastructure for unit tests.
//!
//! Every stub records the calls it receives so tests can assert on order and
//! arguments. `StubAgent` and `StubFs` share one identity set, the way the
//! real agent writes the identity files that the filesystem adapter reads.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use paco_cli::application::ports::{
    AgentCli, AgentRegistration, ControlPlane, HttpReply, InstanceFs, LogOptions, LogStream,
    ProcessSignaller, ProgressReporter, Supervisor, UnitChange,
};
use paco_cli::application::services::pool::{PoolOrchestrator, PoolPorts};
use paco_cli::domain::{
    AgentError, Credential, PoolConfig, PoolConfigFile, RegistrationToken, Signal, Timeouts,
    UnitDefinition,
};
use paco_common::InstanceStatus;
use tokio_util::sync::CancellationToken;

// ── Config ────────────────────────────────────────────────────────────────────

pub fn org_file(count: i64) -> PoolConfigFile {
    PoolConfigFile {
        pool_name: Some("ci".to_string()),
        instance_count: Some(count),
        credential: Some("ghp_test_credential".to_string()),
        registration_org: Some("acme".to_string()),
        labels: Some("self-hosted,linux".to_string()),
        runners_root: Some(PathBuf::from("/opt/ci")),
        ..PoolConfigFile::default()
    }
}

pub fn resolve(file: &PoolConfigFile) -> PoolConfig {
    file.resolve(|_, _| 0).expect("valid config").config
}

pub fn pool_config(count: i64) -> PoolConfig {
    resolve(&org_file(count))
}

/// Short settle times so tests that run in real time stay fast.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        instance_stop: Duration::from_millis(40),
        group_stop: Duration::from_millis(80),
        stop_poll: Duration::from_millis(5),
        post_kill_settle: Duration::from_millis(5),
        pre_register_settle: Duration::from_millis(5),
        ..Timeouts::default()
    }
}

pub fn unit(index: u8) -> String {
    format!("ci-runner-{index}.service")
}

pub const GROUP: &str = "ci-runners.target";

// ── Control plane ─────────────────────────────────────────────────────────────

/// Issues `reg-N` / `rm-N` tokens, numbering each kind separately.
#[derive(Default)]
pub struct StubControlPlane {
    pub requests: Mutex<Vec<String>>,
    /// Every request from this (0-based) position on answers HTTP 503.
    pub failing_from: Option<usize>,
    issued_reg: AtomicUsize,
    issued_rm: AtomicUsize,
}

impl StubControlPlane {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ControlPlane for StubControlPlane {
    async fn post(&self, path: &str, credential: &Credential) -> Result<HttpReply> {
        assert_eq!(credential.expose(), "ghp_test_credential");
        let position = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(path.to_string());
            requests.len() - 1
        };
        if self.failing_from.is_some_and(|from| position >= from) {
            return Ok(HttpReply {
                status: 503,
                body: b"{}".to_vec(),
            });
        }
        let token = if path.ends_with("registration-token") {
            format!("reg-{}", self.issued_reg.fetch_add(1, Ordering::SeqCst) + 1)
        } else {
            format!("rm-{}", self.issued_rm.fetch_add(1, Ordering::SeqCst) + 1)
        };
        Ok(HttpReply {
            status: 201,
            body: serde_json::json!({ "token": token }).to_string().into_bytes(),
        })
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// In-memory supervisor. Units are inactive until started.
#[derive(Default)]
pub struct StubSupervisor {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, InstanceStatus>>,
    stored: Mutex<HashSet<String>>,
    /// Units that stay active after a stop request.
    pub stubborn: HashSet<String>,
    /// Units that stay active after SIGKILL too.
    pub unkillable: HashSet<String>,
    pub failing_start: HashSet<String>,
    pub failing_status: HashSet<String>,
    /// How long a stop request takes to return.
    pub stop_delay: Option<Duration>,
    /// Units keep running this long after a stop request that returned at once.
    pub winds_down: Option<Duration>,
    stop_requested: Mutex<HashMap<String, tokio::time::Instant>>,
}

impl StubSupervisor {
    pub fn set_status(&self, unit: &str, status: InstanceStatus) {
        self.statuses.lock().unwrap().insert(unit.to_string(), status);
    }

    pub fn status_of(&self, unit: &str) -> InstanceStatus {
        self.statuses
            .lock()
            .unwrap()
            .get(unit)
            .copied()
            .unwrap_or(InstanceStatus::Inactive)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls naming `unit`, with the unit name stripped, e.g. `["status", "stop"]`.
    pub fn calls_for(&self, unit: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| {
                let (op, rest) = c.split_once(' ')?;
                let (name, extra) = rest.split_once(' ').unwrap_or((rest, ""));
                (name == unit).then(|| {
                    if extra.is_empty() {
                        op.to_string()
                    } else {
                        format!("{op} {extra}")
                    }
                })
            })
            .collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Supervisor for StubSupervisor {
    async fn register(&self, unit: &UnitDefinition) -> Result<UnitChange> {
        self.record(format!("register {}", unit.name));
        if self.stored.lock().unwrap().insert(unit.name.clone()) {
            Ok(UnitChange::Written)
        } else {
            Ok(UnitChange::Unchanged)
        }
    }

    async fn reload(&self) -> Result<()> {
        self.record("reload".to_string());
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<bool> {
        self.record(format!("unregister {name}"));
        Ok(self.stored.lock().unwrap().remove(name))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.record(format!("start {name}"));
        if self.failing_start.contains(name) {
            anyhow::bail!("Job for {name} failed");
        }
        self.set_status(name, InstanceStatus::Active);
        Ok(())
    }

    async fn stop(&self, name: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("stop {name}"));
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }
        if self.stubborn.contains(name) {
            return Ok(());
        }
        if self.winds_down.is_some() {
            self.stop_requested
                .lock()
                .unwrap()
                .insert(name.to_string(), tokio::time::Instant::now());
        } else {
            self.set_status(name, InstanceStatus::Inactive);
        }
        Ok(())
    }

    async fn kill(&self, name: &str, signal: Signal) -> Result<()> {
        self.record(format!("kill {name} {signal}"));
        if !self.unkillable.contains(name) {
            self.set_status(name, InstanceStatus::Inactive);
        }
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<InstanceStatus> {
        self.record(format!("status {name}"));
        if self.failing_status.contains(name) {
            anyhow::bail!("Failed to connect to bus");
        }
        let wound_down = self.winds_down.is_some_and(|lag| {
            self.stop_requested
                .lock()
                .unwrap()
                .get(name)
                .is_some_and(|at| at.elapsed() >= lag)
        });
        if wound_down {
            self.set_status(name, InstanceStatus::Inactive);
        }
        Ok(self.status_of(name))
    }

    async fn enable(&self, name: &str) -> Result<()> {
        self.record(format!("enable {name}"));
        Ok(())
    }

    async fn disable(&self, name: &str) -> Result<()> {
        self.record(format!("disable {name}"));
        Ok(())
    }

    fn logs(&self, names: &[String], options: &LogOptions) -> Result<LogStream> {
        self.record(format!("logs {}", names.join(",")));
        let lines: Vec<Result<String>> = names
            .iter()
            .map(|n| Ok(format!("{n}: Listening for Jobs (follow={})", options.follow)))
            .collect();
        Ok(futures_util::stream::iter(lines).boxed())
    }
}

// ── Filesystem ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubFs {
    identities: Arc<Mutex<HashSet<PathBuf>>>,
    pub cleared: Mutex<Vec<PathBuf>>,
    pub clear_fails: bool,
}

impl StubFs {
    pub fn add_identity(&self, dir: impl Into<PathBuf>) {
        self.identities.lock().unwrap().insert(dir.into());
    }

    pub fn identity_count(&self) -> usize {
        self.identities.lock().unwrap().len()
    }
}

impl InstanceFs for StubFs {
    fn has_identity(&self, work_dir: &Path) -> bool {
        self.identities.lock().unwrap().contains(work_dir)
    }

    fn clear_identity(&self, work_dir: &Path) -> Result<()> {
        self.cleared.lock().unwrap().push(work_dir.to_path_buf());
        if self.clear_fails {
            anyhow::bail!("Permission denied (os error 13)");
        }
        self.identities.lock().unwrap().remove(work_dir);
        Ok(())
    }

    fn count_instance_dirs(&self, _pool_name: &str, _root: &Path) -> usize {
        self.identities.lock().unwrap().len()
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

/// What one `configure` call received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configured {
    pub name: String,
    pub token: String,
    pub url: String,
    pub labels: String,
    pub group: Option<String>,
    pub replace: bool,
}

#[derive(Default)]
pub struct StubAgent {
    identities: Arc<Mutex<HashSet<PathBuf>>>,
    pub configured: Mutex<Vec<Configured>>,
    pub removed: Mutex<Vec<(PathBuf, String)>>,
    /// Instance names whose registration fails outright.
    pub failing: HashSet<String>,
    /// Token values the control plane refuses.
    pub rejected_tokens: HashSet<String>,
    pub remove_fails: bool,
}

impl StubAgent {
    /// An agent whose successful registrations show up in `fs`.
    pub fn sharing(fs: &StubFs) -> Self {
        Self {
            identities: Arc::clone(&fs.identities),
            ..Self::default()
        }
    }

    pub fn configured_names(&self) -> Vec<String> {
        self.configured
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

impl AgentCli for StubAgent {
    async fn configure(&self, registration: &AgentRegistration<'_>) -> Result<(), AgentError> {
        self.configured.lock().unwrap().push(Configured {
            name: registration.name.to_string(),
            token: registration.token.expose().to_string(),
            url: registration.url.to_string(),
            labels: registration.labels.joined(),
            group: registration.group.map(String::from),
            replace: registration.replace,
        });
        if self.rejected_tokens.contains(registration.token.expose()) {
            return Err(AgentError::TokenRejected("Http response code: NotFound".to_string()));
        }
        if self.failing.contains(registration.name) {
            return Err(AgentError::Failed("Failed to connect to github.com".to_string()));
        }
        self.identities
            .lock()
            .unwrap()
            .insert(registration.work_dir.to_path_buf());
        Ok(())
    }

    async fn remove(&self, work_dir: &Path, token: &RegistrationToken) -> Result<(), AgentError> {
        self.removed
            .lock()
            .unwrap()
            .push((work_dir.to_path_buf(), token.expose().to_string()));
        if self.remove_fails {
            return Err(AgentError::Failed("runner not found on server".to_string()));
        }
        self.identities.lock().unwrap().remove(work_dir);
        Ok(())
    }
}

// ── Processes ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubProcesses {
    pub patterns: Mutex<Vec<String>>,
    pub matched: bool,
    pub fails: bool,
}

impl ProcessSignaller for StubProcesses {
    async fn terminate_matching(&self, pattern: &str) -> Result<bool> {
        self.patterns.lock().unwrap().push(pattern.to_string());
        if self.fails {
            anyhow::bail!("pkill: killing pid 4242 failed: Operation not permitted");
        }
        Ok(self.matched)
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<String>>,
    /// Cancelled as soon as the first instance reports success.
    pub cancel_on_success: Option<CancellationToken>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("step: {message}"));
    }

    fn success(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("ok: {message}"));
        if let Some(cancel) = &self.cancel_on_success {
            cancel.cancel();
        }
    }

    fn warn(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("warn: {message}"));
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub type StubPool<'a> =
    PoolOrchestrator<'a, StubControlPlane, StubSupervisor, StubAgent, StubFs, StubProcesses>;

/// One pool wired to fresh stubs. Adjust the public fields, then call `pool`.
pub struct Harness {
    pub config: PoolConfig,
    pub control_plane: StubControlPlane,
    pub supervisor: StubSupervisor,
    pub fs: StubFs,
    pub agent: StubAgent,
    pub processes: StubProcesses,
    pub timeouts: Timeouts,
}

impl Harness {
    pub fn new(count: i64) -> Self {
        Self::with_config(pool_config(count))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let fs = StubFs::default();
        let agent = StubAgent::sharing(&fs);
        Self {
            config,
            control_plane: StubControlPlane::default(),
            supervisor: StubSupervisor::default(),
            fs,
            agent,
            processes: StubProcesses::default(),
            timeouts: fast_timeouts(),
        }
    }

    pub fn pool(&self) -> StubPool<'_> {
        PoolOrchestrator::new(
            &self.config,
            PoolPorts {
                control_plane: &self.control_plane,
                supervisor: &self.supervisor,
                agent: &self.agent,
                fs: &self.fs,
                processes: &self.processes,
            },
            self.timeouts,
        )
    }

    pub fn all_units(&self) -> Vec<String> {
        let count = self.config.instance_count;
        (1..=count).map(unit).chain([GROUP.to_string()]).collect()
    }

    pub fn mark_active(&self, units: &[String]) {
        for u in units {
            self.supervisor.set_status(u, InstanceStatus::Active);
        }
    }
}
