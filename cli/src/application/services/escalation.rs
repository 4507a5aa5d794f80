//! Application service: bringing a single unit down.
//!
//! Graceful: stop request, status polled until the unit is down or the grace
//! period has passed, SIGKILL if still active, settle, re-query. Forced: SIGKILL first, then a stop request so the supervisor
//! does not restart the unit. Supervisor errors are collected and the
//! sequence keeps going.

use std::time::Duration;

use tokio::time::Instant;

use paco_common::{InstanceStatus, StopMode, StopOutcome};

use crate::application::ports::Supervisor;
use crate::domain::{Signal, SupervisorError};

/// Bounds for one [`bring_down`] call.
#[derive(Debug, Clone, Copy)]
pub struct StopBudget {
    /// How long the normal stop may take before SIGKILL.
    pub grace: Duration,
    /// Interval between status checks during the grace period.
    pub poll: Duration,
    /// Pause after SIGKILL before re-querying.
    pub settle: Duration,
    /// Upper bound for status and kill calls.
    pub call: Duration,
}

/// Stop `unit` according to `mode`. Idempotent: an inactive unit is left
/// alone and reported as [`StopOutcome::AlreadyStopped`].
pub async fn bring_down(
    supervisor: &impl Supervisor,
    unit: &str,
    mode: StopMode,
    budget: StopBudget,
) -> (StopOutcome, Vec<SupervisorError>) {
    let mut errors = Vec::new();

    if query(supervisor, unit, budget.call, &mut errors).await == Some(false) {
        tracing::debug!(unit, "already stopped");
        return (StopOutcome::AlreadyStopped, errors);
    }

    let outcome = match mode {
        StopMode::Graceful => {
            if wait_for_stop(supervisor, unit, budget, &mut errors).await {
                StopOutcome::Stopped
            } else {
                tracing::info!(unit, grace_secs = budget.grace.as_secs(), "still active after stop; sending SIGKILL");
                send_kill(supervisor, unit, budget.call, &mut errors).await;
                settle_and_check(supervisor, unit, budget, &mut errors).await
            }
        }
        StopMode::Forced => {
            send_kill(supervisor, unit, budget.call, &mut errors).await;
            request_stop(supervisor, unit, budget.grace, &mut errors).await;
            settle_and_check(supervisor, unit, budget, &mut errors).await
        }
    };

    tracing::info!(unit, ?outcome, "stop finished");
    (outcome, errors)
}

/// Request a stop, then poll until the unit is down or `budget.grace` has
/// passed since the request. An unknown status ends the wait early.
async fn wait_for_stop(
    supervisor: &impl Supervisor,
    unit: &str,
    budget: StopBudget,
    errors: &mut Vec<SupervisorError>,
) -> bool {
    let deadline = Instant::now() + budget.grace;
    request_stop(supervisor, unit, budget.grace, errors).await;
    loop {
        match query(supervisor, unit, budget.call, errors).await {
            Some(false) => return true,
            None => return false,
            Some(true) => {}
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(budget.poll.min(deadline - now)).await;
    }
}

async fn settle_and_check(
    supervisor: &impl Supervisor,
    unit: &str,
    budget: StopBudget,
    errors: &mut Vec<SupervisorError>,
) -> StopOutcome {
    tokio::time::sleep(budget.settle).await;
    if query(supervisor, unit, budget.call, errors).await == Some(false) {
        StopOutcome::Killed
    } else {
        StopOutcome::NotStopped
    }
}

/// `Some(true)` if active, `Some(false)` if down, `None` if unknown.
async fn query(
    supervisor: &impl Supervisor,
    unit: &str,
    limit: Duration,
    errors: &mut Vec<SupervisorError>,
) -> Option<bool> {
    match bounded(limit, supervisor.status(unit)).await {
        Ok(status) => Some(status == InstanceStatus::Active),
        Err(cause) => {
            errors.push(SupervisorError {
                unit: unit.to_string(),
                op: "status",
                cause,
            });
            None
        }
    }
}

async fn request_stop(
    supervisor: &impl Supervisor,
    unit: &str,
    grace: Duration,
    errors: &mut Vec<SupervisorError>,
) {
    if let Err(cause) = bounded(grace, supervisor.stop(unit, grace)).await {
        errors.push(SupervisorError {
            unit: unit.to_string(),
            op: "stop",
            cause,
        });
    }
}

async fn send_kill(
    supervisor: &impl Supervisor,
    unit: &str,
    limit: Duration,
    errors: &mut Vec<SupervisorError>,
) {
    if let Err(cause) = bounded(limit, supervisor.kill(unit, Signal::Kill)).await {
        errors.push(SupervisorError {
            unit: unit.to_string(),
            op: "kill",
            cause,
        });
    }
}

/// Await `fut` for at most `limit`, folding the timeout into the error.
pub(crate) async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("timed out after {}s", limit.as_secs())),
    }
}
