use serde::{Deserialize, Serialize};

/// Supervisor-reported state of a single unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Failed,
    Inactive,
}

impl InstanceStatus {
    /// Map a `systemctl is-active` style word to a status.
    ///
    /// Transitional states count as active: the unit still owns a process.
    #[must_use]
    pub fn from_supervisor_word(word: &str) -> Self {
        match word.trim() {
            "active" | "activating" | "reloading" | "deactivating" | "refreshing" => Self::Active,
            "failed" => Self::Failed,
            _ => Self::Inactive,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote registration lifecycle of one runner slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    #[default]
    Unconfigured,
    Registered,
    Stale,
    Removed,
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unconfigured => "unconfigured",
            Self::Registered => "registered",
            Self::Stale => "stale",
            Self::Removed => "removed",
        })
    }
}

/// How `stop` treats running instances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Ask the supervisor first, escalate to SIGKILL only on timeout.
    #[default]
    Graceful,
    /// SIGKILL straight away, then mark the unit stopped.
    Forced,
}

/// Status line for one unit, as printed by `paco status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitStatusEntry {
    /// 1-based slot index; `None` for the group unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    pub name: String,
    pub unit: String,
    pub status: InstanceStatus,
    /// Set when the supervisor could not be queried; `status` is then `inactive`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full output of `paco status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOutput {
    pub pool: String,
    pub group: UnitStatusEntry,
    pub instances: Vec<UnitStatusEntry>,
}

impl StatusOutput {
    /// Number of instances currently active.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Active)
            .count()
    }
}
