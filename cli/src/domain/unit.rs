//! Supervision unit definitions and the generator that derives them.
//!
//! `generate` is a pure function of [`PoolConfig`]: the same config always
//! yields byte-identical rendered units, so re-running install never rewrites
//! (or restarts) anything that did not change.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::config::PoolConfig;
use crate::domain::error::ConfigError;
use crate::domain::instance::{group_unit_name, pool_instances};

/// Longest the supervisor waits after SIGTERM before SIGKILL.
pub const STOP_ESCALATION_WAIT: Duration = Duration::from_secs(30);

/// Delay between automatic restarts.
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Entry point of the agent inside each instance directory.
pub const AGENT_RUN_SCRIPT: &str = "run.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Instance,
    Group,
}

/// What the supervisor does when the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    #[default]
    Always,
    /// Manual runs: the process is not brought back after it exits.
    Never,
}

impl FromStr for RestartPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(ConfigError::InvalidRestartPolicy(other.to_string())),
        }
    }
}

/// POSIX signals the manager sends or asks the supervisor to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a kill escalation: send `signal`, then wait up to `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillStep {
    pub signal: Signal,
    pub wait: Duration,
}

/// How the supervisor should run one instance or the pool group.
///
/// Derived, disposable state: regenerated on every install and overwritten
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    pub kind: UnitKind,
    /// Supervisor identifier, e.g. `paco-runner-1.service`.
    pub name: String,
    pub description: String,
    pub restart_policy: RestartPolicy,
    /// Ends in a forced kill. Empty for the group unit.
    pub kill_escalation: Vec<KillStep>,
    pub environment: BTreeMap<String, String>,
    /// The only writable paths.
    pub resource_scope: Vec<PathBuf>,
    pub user: Option<String>,
    pub working_directory: Option<PathBuf>,
    pub exec_start: Option<String>,
    /// Units this one pulls in (group only).
    pub wants: Vec<String>,
    /// Group this unit belongs to (instances only).
    pub part_of: Option<String>,
}

/// Output of [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnits {
    pub instance_units: Vec<UnitDefinition>,
    pub group_unit: UnitDefinition,
}

impl GeneratedUnits {
    /// Instance units followed by the group unit.
    pub fn all(&self) -> impl Iterator<Item = &UnitDefinition> {
        self.instance_units
            .iter()
            .chain(std::iter::once(&self.group_unit))
    }
}

/// Build the per-instance units and the group unit for `config`.
#[must_use]
pub fn generate(config: &PoolConfig) -> GeneratedUnits {
    let group_name = group_unit_name(&config.pool_name);

    let instance_units: Vec<UnitDefinition> = pool_instances(config)
        .into_iter()
        .map(|instance| {
            let dir = instance.working_directory.clone();
            UnitDefinition {
                kind: UnitKind::Instance,
                name: instance.unit_name(),
                description: format!("{} runner {}", config.pool_name, instance.name),
                restart_policy: config.restart_policy,
                kill_escalation: vec![
                    KillStep {
                        signal: Signal::Term,
                        wait: STOP_ESCALATION_WAIT,
                    },
                    KillStep {
                        signal: Signal::Kill,
                        wait: Duration::ZERO,
                    },
                ],
                environment: agent_environment(),
                resource_scope: vec![dir.clone(), config.log_directory.clone()],
                user: config.run_as_user.clone(),
                exec_start: Some(dir.join(AGENT_RUN_SCRIPT).display().to_string()),
                working_directory: Some(dir),
                wants: Vec::new(),
                part_of: Some(group_name.clone()),
            }
        })
        .collect();

    let group_unit = UnitDefinition {
        kind: UnitKind::Group,
        description: format!(
            "{} runner pool ({} instances)",
            config.pool_name, config.instance_count
        ),
        name: group_name,
        restart_policy: RestartPolicy::Never,
        kill_escalation: Vec::new(),
        environment: BTreeMap::new(),
        resource_scope: Vec::new(),
        user: None,
        working_directory: None,
        exec_start: None,
        wants: instance_units.iter().map(|u| u.name.clone()).collect(),
        part_of: None,
    };

    GeneratedUnits {
        instance_units,
        group_unit,
    }
}

fn agent_environment() -> BTreeMap<String, String> {
    BTreeMap::from([
        // Disable the agent's refusal to run as root.
        ("RUNNER_ALLOW_RUNASROOT".to_string(), "1".to_string()),
        // Let run.sh forward SIGTERM to the listener instead of dying first.
        ("RUNNER_MANUALLY_TRAP_SIG".to_string(), "1".to_string()),
    ])
}

impl UnitDefinition {
    /// Render as a systemd unit file.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Generated by paco. Manual edits are overwritten on the next install.\n");
        out.push_str("[Unit]\n");
        push_kv(&mut out, "Description", &self.description);
        match self.kind {
            UnitKind::Instance => {
                push_kv(&mut out, "After", "network-online.target");
                push_kv(&mut out, "Wants", "network-online.target");
                if let Some(group) = &self.part_of {
                    push_kv(&mut out, "PartOf", group);
                }
                out.push('\n');
                self.render_service(&mut out);
            }
            UnitKind::Group => {
                if !self.wants.is_empty() {
                    push_kv(&mut out, "Wants", &self.wants.join(" "));
                    push_kv(&mut out, "After", &self.wants.join(" "));
                }
            }
        }
        out.push_str("\n[Install]\n");
        push_kv(&mut out, "WantedBy", "multi-user.target");
        out
    }

    fn render_service(&self, out: &mut String) {
        out.push_str("[Service]\n");
        push_kv(out, "Type", "simple");
        if let Some(user) = &self.user {
            push_kv(out, "User", user);
        }
        if let Some(dir) = &self.working_directory {
            push_kv(out, "WorkingDirectory", &dir.display().to_string());
        }
        if let Some(exec) = &self.exec_start {
            push_kv(out, "ExecStart", exec);
        }
        for (key, value) in &self.environment {
            push_kv(out, "Environment", &format!("\"{key}={value}\""));
        }
        match self.restart_policy {
            RestartPolicy::Always => {
                push_kv(out, "Restart", "always");
                push_kv(out, "RestartSec", &RESTART_DELAY.as_secs().to_string());
            }
            RestartPolicy::Never => push_kv(out, "Restart", "no"),
        }
        if let Some(first) = self.kill_escalation.first() {
            push_kv(out, "KillMode", "mixed");
            push_kv(out, "KillSignal", first.signal.as_str());
            push_kv(out, "TimeoutStopSec", &first.wait.as_secs().to_string());
        }
        let forced = self
            .kill_escalation
            .last()
            .is_some_and(|s| s.signal == Signal::Kill);
        push_kv(out, "SendSIGKILL", if forced { "yes" } else { "no" });
        push_kv(out, "ProtectSystem", "strict");
        push_kv(out, "PrivateTmp", "yes");
        if !self.resource_scope.is_empty() {
            let paths: Vec<String> = self
                .resource_scope
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            push_kv(out, "ReadWritePaths", &paths.join(" "));
        }
    }
}

fn push_kv(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{key}={value}");
}
