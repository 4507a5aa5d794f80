//! Bounded waits for every suspending call the manager makes.

use std::time::Duration;

/// Upper bounds on supervisor, agent and control-plane calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// One token exchange with the control plane.
    pub token_fetch: Duration,
    /// Graceful stop of a single instance before SIGKILL.
    pub instance_stop: Duration,
    /// Graceful stop of the group unit before SIGKILL.
    pub group_stop: Duration,
    /// Interval between status checks while waiting for a stop.
    pub stop_poll: Duration,
    /// Pause after a SIGKILL before the status is re-queried.
    pub post_kill_settle: Duration,
    /// Pause after signalling stray processes before registering.
    pub pre_register_settle: Duration,
    /// Quick supervisor calls: status, start, kill, enable.
    pub supervisor_call: Duration,
    /// One agent `configure` or `remove` invocation.
    pub agent_call: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            token_fetch: Duration::from_secs(30),
            instance_stop: Duration::from_secs(15),
            group_stop: Duration::from_secs(30),
            stop_poll: Duration::from_millis(500),
            post_kill_settle: Duration::from_secs(2),
            pre_register_settle: Duration::from_secs(2),
            supervisor_call: Duration::from_secs(30),
            agent_call: Duration::from_secs(120),
        }
    }
}
