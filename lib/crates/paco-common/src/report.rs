//! Per-operation reports.
//!
//! Every pool operation returns one of these so callers can see exactly which
//! of N instances succeeded. Partial degradation is an expected state, so each
//! report carries its own tally instead of a single pass/fail flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{InstanceStatus, RegistrationState, StopMode};

/// Counting interface shared by all reports.
pub trait Tally {
    /// Instances whose operation succeeded.
    fn succeeded(&self) -> usize;
    /// Instances the operation was attempted on (or skipped).
    fn total(&self) -> usize;

    /// `true` when nothing failed or was skipped.
    fn all_succeeded(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// Human tally, e.g. `"3 of 5 succeeded"`.
    fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded(), self.total())
    }
}

/// Result of one instance within a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Not attempted (install cancelled before reaching this instance).
    Skipped,
}

/// One row of an install, start or uninstall report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceEntry {
    pub index: u8,
    pub name: String,
    pub outcome: Outcome,
    /// Registration state after the operation, where it applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RegistrationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal problems (stale-state cleanup, best-effort steps).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl InstanceEntry {
    #[must_use]
    pub fn succeeded(index: u8, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            outcome: Outcome::Succeeded,
            state: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn failed(index: u8, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            outcome: Outcome::Failed,
            state: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn skipped(index: u8, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            outcome: Outcome::Skipped,
            state: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: RegistrationState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

fn count_succeeded(entries: &[InstanceEntry]) -> usize {
    entries
        .iter()
        .filter(|e| e.outcome == Outcome::Succeeded)
        .count()
}

/// Result of `paco install`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub pool: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Install was interrupted between instances.
    pub cancelled: bool,
    /// At least one stored unit definition was rewritten.
    pub units_changed: bool,
    /// Times a fresh token pair was fetched after the agent rejected one.
    pub token_refetches: u32,
    pub instances: Vec<InstanceEntry>,
    /// Best-effort post-registration steps that failed (enable, reload).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Tally for InstallReport {
    fn succeeded(&self) -> usize {
        count_succeeded(&self.instances)
    }
    fn total(&self) -> usize {
        self.instances.len()
    }
}

/// Result of `paco start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartReport {
    pub pool: String,
    pub instances: Vec<InstanceEntry>,
    /// Group-unit problems; they do not count against the tally.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Tally for StartReport {
    fn succeeded(&self) -> usize {
        count_succeeded(&self.instances)
    }
    fn total(&self) -> usize {
        self.instances.len()
    }
}

/// How a single unit ended up after `stop`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Already inactive; nothing was sent.
    AlreadyStopped,
    /// Honoured the normal stop request.
    Stopped,
    /// Needed a SIGKILL to go down.
    Killed,
    /// Could not be confirmed stopped.
    NotStopped,
}

/// One row of a stop report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopEntry {
    /// `None` for the group unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    pub name: String,
    pub unit: String,
    pub outcome: StopOutcome,
    /// Supervisor errors hit along the way; the escalation continues past them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl StopEntry {
    #[must_use]
    pub fn is_down(&self) -> bool {
        self.outcome != StopOutcome::NotStopped
    }
}

/// Result of `paco stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReport {
    pub pool: String,
    pub mode: StopMode,
    pub instances: Vec<StopEntry>,
    pub group: StopEntry,
}

impl Tally for StopReport {
    fn succeeded(&self) -> usize {
        self.instances.iter().filter(|e| e.is_down()).count()
    }
    fn total(&self) -> usize {
        self.instances.len()
    }
    fn all_succeeded(&self) -> bool {
        self.succeeded() == self.total() && self.group.is_down()
    }
}

/// One row of a kill report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KillEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    pub name: String,
    pub unit: String,
    /// SIGKILL was delivered.
    pub signalled: bool,
    /// Status re-queried after the settle delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_after: Option<InstanceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `paco kill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillReport {
    pub pool: String,
    pub instances: Vec<KillEntry>,
    pub group: KillEntry,
}

impl Tally for KillReport {
    fn succeeded(&self) -> usize {
        self.instances.iter().filter(|e| e.signalled).count()
    }
    fn total(&self) -> usize {
        self.instances.len()
    }
}

/// Result of `paco uninstall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UninstallReport {
    pub pool: String,
    pub stop: StopReport,
    pub instances: Vec<InstanceEntry>,
    pub units_removed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Tally for UninstallReport {
    fn succeeded(&self) -> usize {
        count_succeeded(&self.instances)
    }
    fn total(&self) -> usize {
        self.instances.len()
    }
}
