//! Application service: per-instance registration state machine.
//!
//! `Unconfigured → Stale → Unconfigured → Registered`: existing identity is
//! deregistered remotely when possible and always removed locally, stray
//! agent processes are signalled, then the agent registers with replace
//! semantics so the call can be repeated safely.

use paco_common::RegistrationState;

use crate::application::ports::{AgentCli, AgentRegistration, InstanceFs, ProcessSignaller};
use crate::domain::{
    AgentError, CleanupStage, PoolConfig, RegistrationError, RunnerInstance, StaleStateCleanupError,
    Timeouts, TokenPair,
};

/// Drives one instance through registration.
pub struct InstanceController<'a, A, F, P> {
    agent: &'a A,
    fs: &'a F,
    processes: &'a P,
    config: &'a PoolConfig,
    timeouts: Timeouts,
}

impl<'a, A: AgentCli, F: InstanceFs, P: ProcessSignaller> InstanceController<'a, A, F, P> {
    pub fn new(
        agent: &'a A,
        fs: &'a F,
        processes: &'a P,
        config: &'a PoolConfig,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            agent,
            fs,
            processes,
            config,
            timeouts,
        }
    }

    /// Register `instance`, cleaning up whatever an earlier registration left
    /// behind. Updates `instance` in place and returns the non-fatal cleanup
    /// problems met on the way.
    ///
    /// # Errors
    ///
    /// `RegistrationError` if the agent's register call fails. Cleanup
    /// failures never surface here.
    pub async fn configure(
        &self,
        instance: &mut RunnerInstance,
        tokens: &TokenPair,
    ) -> Result<Vec<StaleStateCleanupError>, RegistrationError> {
        let mut warnings = Vec::new();

        instance.credentials_present = self.fs.has_identity(&instance.working_directory);
        if instance.credentials_present {
            instance.registration_state = RegistrationState::Stale;
            self.clear_stale(instance, tokens, &mut warnings).await;
        }
        instance.registration_state = RegistrationState::Unconfigured;

        self.terminate_strays(instance, &mut warnings).await;

        let labels = &self.config.labels;
        let url = self.config.target.registration_url(&self.config.server_url);
        let registration = AgentRegistration {
            url: &url,
            token: &tokens.registration,
            name: &instance.name,
            labels,
            group: self.config.group.as_deref(),
            work_dir: &instance.working_directory,
            replace: true,
        };
        tracing::info!(instance = %instance.name, target = %self.config.target.describe(), "registering");
        let result = tokio::time::timeout(self.timeouts.agent_call, self.agent.configure(&registration))
            .await
            .unwrap_or_else(|_| {
                Err(AgentError::Failed(format!(
                    "configure timed out after {}s",
                    self.timeouts.agent_call.as_secs()
                )))
            });

        match result {
            Ok(()) => {
                instance.registration_state = RegistrationState::Registered;
                instance.credentials_present = true;
                Ok(warnings)
            }
            Err(cause) => {
                tracing::info!(instance = %instance.name, error = %cause, "registration failed");
                Err(RegistrationError {
                    instance_name: instance.name.clone(),
                    cause,
                })
            }
        }
    }

    /// Deregister remotely if possible; always make sure local identity is gone.
    async fn clear_stale(
        &self,
        instance: &mut RunnerInstance,
        tokens: &TokenPair,
        warnings: &mut Vec<StaleStateCleanupError>,
    ) {
        let dir = &instance.working_directory;
        tracing::info!(instance = %instance.name, "existing identity found; deregistering");

        let removed = tokio::time::timeout(self.timeouts.agent_call, self.agent.remove(dir, &tokens.removal))
            .await
            .unwrap_or_else(|_| Err(AgentError::Failed("remove timed out".to_string())));
        match removed {
            Ok(()) => instance.registration_state = RegistrationState::Removed,
            Err(cause) => warnings.push(cleanup_warning(instance, CleanupStage::RemoteDeregistration, cause)),
        }

        if self.fs.has_identity(dir) {
            if let Err(cause) = self.fs.clear_identity(dir) {
                warnings.push(cleanup_warning(
                    instance,
                    CleanupStage::LocalIdentityRemoval,
                    format!("{cause:#}"),
                ));
            }
        }
        instance.credentials_present = self.fs.has_identity(dir);
    }

    /// Best-effort SIGTERM to agent processes still running from the
    /// instance directory, followed by a short settle.
    async fn terminate_strays(&self, instance: &RunnerInstance, warnings: &mut Vec<StaleStateCleanupError>) {
        // Trailing slash keeps `runner-1` from matching `runner-10`.
        let pattern = format!("{}/", instance.working_directory.display());
        match self.processes.terminate_matching(&pattern).await {
            Ok(true) => {
                tracing::debug!(instance = %instance.name, "signalled leftover agent processes");
                tokio::time::sleep(self.timeouts.pre_register_settle).await;
            }
            Ok(false) => {}
            Err(cause) => warnings.push(cleanup_warning(
                instance,
                CleanupStage::ProcessTermination,
                format!("{cause:#}"),
            )),
        }
    }
}

fn cleanup_warning(
    instance: &RunnerInstance,
    stage: CleanupStage,
    cause: impl ToString,
) -> StaleStateCleanupError {
    let err = StaleStateCleanupError {
        instance_name: instance.name.clone(),
        stage,
        cause: cause.to_string(),
    };
    tracing::info!(instance = %instance.name, %stage, error = %err.cause, "cleanup step did not complete");
    err
}
