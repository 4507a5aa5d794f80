//! Application service: pool-wide lifecycle operations.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! `install` is strictly sequential over instances; `start`, `stop`,
//! `status` and `kill` fan out over instances concurrently since each
//! instance unit is independent once registered.

use chrono::Utc;
use futures_util::future::join_all;
use paco_common::{
    InstallReport, InstanceEntry, InstanceStatus, KillEntry, KillReport, Outcome,
    RegistrationState, StartReport, StatusOutput, StopEntry, StopMode, StopOutcome, StopReport,
    Tally, UninstallReport, UnitStatusEntry,
};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AgentCli, ControlPlane, InstanceFs, LogOptions, LogStream, ProcessSignaller, ProgressReporter,
    Supervisor, UnitChange,
};
use crate::application::services::escalation::{StopBudget, bounded, bring_down};
use crate::application::services::instance_controller::InstanceController;
use crate::application::services::token_broker::TokenBroker;
use crate::domain::instance::{group_unit_name, pool_instances};
use crate::domain::unit::generate;
use crate::domain::{
    AgentError, CleanupStage, PoolConfig, PoolError, RegistrationError, RegistrationToken,
    RunnerInstance, Signal, StaleStateCleanupError, Timeouts, TokenKind,
};

/// Production or test implementations of every port the orchestrator drives.
pub struct PoolPorts<'a, C, S, A, F, P> {
    pub control_plane: &'a C,
    pub supervisor: &'a S,
    pub agent: &'a A,
    pub fs: &'a F,
    pub processes: &'a P,
}

/// Which units `logs` should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSelector {
    All,
    Instance(u8),
}

/// Runs install/start/stop/status/kill/logs/uninstall for one pool.
pub struct PoolOrchestrator<'a, C, S, A, F, P> {
    config: &'a PoolConfig,
    ports: PoolPorts<'a, C, S, A, F, P>,
    timeouts: Timeouts,
}

impl<'a, C, S, A, F, P> PoolOrchestrator<'a, C, S, A, F, P>
where
    C: ControlPlane,
    S: Supervisor,
    A: AgentCli,
    F: InstanceFs,
    P: ProcessSignaller,
{
    pub fn new(config: &'a PoolConfig, ports: PoolPorts<'a, C, S, A, F, P>, timeouts: Timeouts) -> Self {
        Self {
            config,
            ports,
            timeouts,
        }
    }

    fn broker(&self) -> TokenBroker<'a, C> {
        TokenBroker::new(self.ports.control_plane, self.timeouts.token_fetch)
    }

    fn group_unit(&self) -> String {
        group_unit_name(&self.config.pool_name)
    }

    fn stop_budget(&self, grace: std::time::Duration) -> StopBudget {
        StopBudget {
            grace,
            poll: self.timeouts.stop_poll,
            settle: self.timeouts.post_kill_settle,
            call: self.timeouts.supervisor_call,
        }
    }

    // ── install ──────────────────────────────────────────────────────────────

    /// Fetch one token pair, write unit definitions and register every
    /// instance in index order. Cancellation is honoured between instances;
    /// the remaining ones are reported as skipped.
    ///
    /// # Errors
    ///
    /// `Broker` if the initial token fetch fails (nothing on the host has
    /// changed yet), `UnitRegistration` if the unit definitions cannot be
    /// stored, `AllInstancesFailed` (carrying the full report) if no instance
    /// could be registered.
    pub async fn install(
        &self,
        reporter: &impl ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<InstallReport, PoolError> {
        let started_at = Utc::now();

        reporter.step("fetching registration tokens...");
        let broker = self.broker();
        let mut tokens = broker
            .fetch_pair(&self.config.target, &self.config.credential)
            .await?;

        let units_changed = self.register_units(reporter).await?;

        let mut report = InstallReport {
            pool: self.config.pool_name.clone(),
            started_at,
            finished_at: started_at,
            cancelled: false,
            units_changed,
            token_refetches: 0,
            instances: Vec::with_capacity(usize::from(self.config.instance_count)),
            warnings: Vec::new(),
        };

        let controller = InstanceController::new(
            self.ports.agent,
            self.ports.fs,
            self.ports.processes,
            self.config,
            self.timeouts,
        );

        for mut instance in pool_instances(self.config) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::info!(instance = %instance.name, "install cancelled; skipping");
                report
                    .instances
                    .push(InstanceEntry::skipped(instance.index, &instance.name));
                continue;
            }

            reporter.step(&format!("configuring {}...", instance.name));
            let mut warnings = self.quiesce(&instance).await;

            let mut result = controller.configure(&mut instance, &tokens).await;
            if let Err(err) = &result
                && err.is_token_rejected()
            {
                match broker
                    .fetch_pair(&self.config.target, &self.config.credential)
                    .await
                {
                    Ok(fresh) => {
                        tracing::info!(instance = %instance.name, "token rejected; retrying with a fresh token");
                        report.token_refetches += 1;
                        tokens = fresh;
                        result = controller.configure(&mut instance, &tokens).await;
                    }
                    Err(broker_err) => {
                        result = Err(RegistrationError {
                            instance_name: instance.name.clone(),
                            cause: AgentError::Failed(format!("token re-fetch failed: {broker_err}")),
                        });
                    }
                }
            }

            let entry = match result {
                Ok(cleanup) => {
                    warnings.extend(cleanup.iter().map(ToString::to_string));
                    if let Err(e) = bounded(
                        self.timeouts.supervisor_call,
                        self.ports.supervisor.enable(&instance.unit_name()),
                    )
                    .await
                    {
                        warnings.push(format!("enable {} failed: {e:#}", instance.unit_name()));
                    }
                    reporter.success(&format!("{} registered", instance.name));
                    InstanceEntry::succeeded(instance.index, &instance.name)
                        .with_state(instance.registration_state)
                }
                Err(err) => {
                    reporter.warn(&err.to_string());
                    InstanceEntry::failed(instance.index, &instance.name, err.cause.to_string())
                        .with_state(instance.registration_state)
                }
            };
            for w in &warnings {
                reporter.warn(w);
            }
            report.instances.push(entry.with_warnings(warnings));
        }

        if report.succeeded() > 0 {
            let group = self.group_unit();
            if let Err(e) = bounded(self.timeouts.supervisor_call, self.ports.supervisor.enable(&group)).await {
                report.warnings.push(format!("enable {group} failed: {e:#}"));
            }
        }

        report.finished_at = Utc::now();
        let failed = report
            .instances
            .iter()
            .filter(|e| e.outcome == Outcome::Failed)
            .count();
        tracing::info!(pool = %report.pool, summary = %report.summary(), cancelled = report.cancelled, "install finished");
        if failed > 0 && failed == report.total() {
            return Err(PoolError::AllInstancesFailed {
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    /// Store every generated unit and reload once if anything changed.
    async fn register_units(&self, reporter: &impl ProgressReporter) -> Result<bool, PoolError> {
        reporter.step("writing unit definitions...");
        let units = generate(self.config);
        let mut changed = false;
        for unit in units.all() {
            let change = self
                .ports
                .supervisor
                .register(unit)
                .await
                .map_err(|e| PoolError::UnitRegistration(e.context(format!("registering {}", unit.name))))?;
            changed |= change == UnitChange::Written;
        }
        if changed {
            bounded(self.timeouts.supervisor_call, self.ports.supervisor.reload())
                .await
                .map_err(PoolError::UnitRegistration)?;
        }
        tracing::debug!(changed, "unit definitions in place");
        Ok(changed)
    }

    /// Bring an active instance down before reconfiguring it. Failures are
    /// returned as warnings.
    async fn quiesce(&self, instance: &RunnerInstance) -> Vec<String> {
        let unit = instance.unit_name();
        let warning = |cause: String| {
            StaleStateCleanupError {
                instance_name: instance.name.clone(),
                stage: CleanupStage::Quiesce,
                cause,
            }
            .to_string()
        };
        match bounded(self.timeouts.supervisor_call, self.ports.supervisor.status(&unit)).await {
            Ok(InstanceStatus::Active) => {}
            Ok(_) => return Vec::new(),
            Err(e) => return vec![warning(format!("{e:#}"))],
        }
        tracing::info!(instance = %instance.name, "stopping running instance before reconfigure");
        let (outcome, errors) = bring_down(
            self.ports.supervisor,
            &unit,
            StopMode::Graceful,
            self.stop_budget(self.timeouts.instance_stop),
        )
        .await;
        let mut warnings: Vec<String> = errors.iter().map(|e| warning(e.to_string())).collect();
        if outcome == StopOutcome::NotStopped {
            warnings.push(warning("still active".to_string()));
        }
        warnings
    }

    // ── start ────────────────────────────────────────────────────────────────

    /// Start every instance unit, then the group.
    pub async fn start(&self) -> StartReport {
        let instances = pool_instances(self.config);
        let entries = join_all(instances.iter().map(|instance| async move {
            let unit = instance.unit_name();
            match bounded(self.timeouts.supervisor_call, self.ports.supervisor.start(&unit)).await {
                Ok(()) => InstanceEntry::succeeded(instance.index, &instance.name),
                Err(e) => {
                    tracing::info!(unit = %unit, error = %e, "start failed");
                    InstanceEntry::failed(instance.index, &instance.name, format!("{e:#}"))
                }
            }
        }))
        .await;

        let mut warnings = Vec::new();
        let group = self.group_unit();
        if let Err(e) = bounded(self.timeouts.supervisor_call, self.ports.supervisor.start(&group)).await {
            warnings.push(format!("start {group} failed: {e:#}"));
        }

        StartReport {
            pool: self.config.pool_name.clone(),
            instances: entries,
            warnings,
        }
    }

    // ── stop ─────────────────────────────────────────────────────────────────

    /// Bring every instance down, then the group. Never aborts early.
    pub async fn stop(&self, mode: StopMode) -> StopReport {
        let instances = pool_instances(self.config);
        let budget = self.stop_budget(self.timeouts.instance_stop);
        let entries = join_all(instances.iter().map(|instance| async move {
            let unit = instance.unit_name();
            let (outcome, errors) = bring_down(self.ports.supervisor, &unit, mode, budget).await;
            StopEntry {
                index: Some(instance.index),
                name: instance.name.clone(),
                unit,
                outcome,
                errors: errors.iter().map(ToString::to_string).collect(),
            }
        }))
        .await;

        let group = self.group_unit();
        let (outcome, errors) = bring_down(
            self.ports.supervisor,
            &group,
            mode,
            self.stop_budget(self.timeouts.group_stop),
        )
        .await;

        StopReport {
            pool: self.config.pool_name.clone(),
            mode,
            instances: entries,
            group: StopEntry {
                index: None,
                name: self.config.pool_name.clone(),
                unit: group,
                outcome,
                errors: errors.iter().map(ToString::to_string).collect(),
            },
        }
    }

    // ── status ───────────────────────────────────────────────────────────────

    /// Read-only status of every instance and the group.
    pub async fn status(&self) -> StatusOutput {
        let instances = pool_instances(self.config);
        let entries = join_all(
            instances
                .iter()
                .map(|i| self.unit_status(Some(i.index), &i.name, i.unit_name())),
        )
        .await;
        let group = self
            .unit_status(None, &self.config.pool_name, self.group_unit())
            .await;
        StatusOutput {
            pool: self.config.pool_name.clone(),
            group,
            instances: entries,
        }
    }

    async fn unit_status(&self, index: Option<u8>, name: &str, unit: String) -> UnitStatusEntry {
        let (status, error) =
            match bounded(self.timeouts.supervisor_call, self.ports.supervisor.status(&unit)).await {
                Ok(status) => (status, None),
                Err(e) => (InstanceStatus::Inactive, Some(format!("{e:#}"))),
            };
        UnitStatusEntry {
            index,
            name: name.to_string(),
            unit,
            status,
            error,
        }
    }

    // ── kill ─────────────────────────────────────────────────────────────────

    /// SIGKILL every instance and the group, bypassing the stop path. The
    /// restart policy stays in effect, so agents come back fresh.
    pub async fn kill(&self) -> KillReport {
        let instances = pool_instances(self.config);
        let mut entries = join_all(
            instances
                .iter()
                .map(|i| self.signal_kill(Some(i.index), &i.name, i.unit_name())),
        )
        .await;
        let mut group = self
            .signal_kill(None, &self.config.pool_name, self.group_unit())
            .await;

        tokio::time::sleep(self.timeouts.post_kill_settle).await;

        for entry in entries.iter_mut().chain(std::iter::once(&mut group)) {
            entry.status_after =
                bounded(self.timeouts.supervisor_call, self.ports.supervisor.status(&entry.unit))
                    .await
                    .ok();
        }

        KillReport {
            pool: self.config.pool_name.clone(),
            instances: entries,
            group,
        }
    }

    async fn signal_kill(&self, index: Option<u8>, name: &str, unit: String) -> KillEntry {
        let result = bounded(
            self.timeouts.supervisor_call,
            self.ports.supervisor.kill(&unit, Signal::Kill),
        )
        .await;
        if let Err(e) = &result {
            tracing::info!(unit = %unit, error = %e, "SIGKILL failed");
        }
        KillEntry {
            index,
            name: name.to_string(),
            unit,
            signalled: result.is_ok(),
            status_after: None,
            error: result.err().map(|e| format!("{e:#}")),
        }
    }

    // ── logs ─────────────────────────────────────────────────────────────────

    /// Lazily stream log lines of the selected units.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is outside the pool or the supervisor's
    /// log reader cannot be started.
    pub fn logs(&self, selector: LogSelector, options: &LogOptions) -> anyhow::Result<LogStream> {
        let units = match selector {
            LogSelector::All => {
                let mut units: Vec<String> = pool_instances(self.config)
                    .iter()
                    .map(RunnerInstance::unit_name)
                    .collect();
                units.push(self.group_unit());
                units
            }
            LogSelector::Instance(index) => {
                if index == 0 || index > self.config.instance_count {
                    anyhow::bail!(
                        "instance {index} does not exist; pool '{}' has {} instances",
                        self.config.pool_name,
                        self.config.instance_count
                    );
                }
                vec![RunnerInstance::new(self.config, index).unit_name()]
            }
        };
        tracing::debug!(?units, follow = options.follow, "opening log stream");
        self.ports.supervisor.logs(&units, options)
    }

    // ── uninstall ────────────────────────────────────────────────────────────

    /// Stop the pool, deregister and wipe every instance, then remove all
    /// unit definitions.
    pub async fn uninstall(&self, reporter: &impl ProgressReporter) -> UninstallReport {
        reporter.step("stopping pool...");
        let stop = self.stop(StopMode::Graceful).await;
        let mut warnings = Vec::new();

        reporter.step("fetching removal token...");
        let removal = match self
            .broker()
            .fetch(TokenKind::Removal, &self.config.target, &self.config.credential)
            .await
        {
            Ok(token) => Some(token),
            Err(e) => {
                let msg = format!("removal token unavailable, cleaning up locally only: {e}");
                reporter.warn(&msg);
                warnings.push(msg);
                None
            }
        };

        let mut entries = Vec::new();
        for instance in pool_instances(self.config) {
            reporter.step(&format!("removing {}...", instance.name));
            entries.push(self.remove_instance(&instance, removal.as_ref()).await);
        }

        let mut units_removed = 0;
        for unit in generate(self.config).all() {
            if let Err(e) = bounded(self.timeouts.supervisor_call, self.ports.supervisor.disable(&unit.name)).await {
                warnings.push(format!("disable {} failed: {e:#}", unit.name));
            }
            match self.ports.supervisor.unregister(&unit.name).await {
                Ok(true) => units_removed += 1,
                Ok(false) => {}
                Err(e) => warnings.push(format!("remove {} failed: {e:#}", unit.name)),
            }
        }
        if units_removed > 0 {
            if let Err(e) = bounded(self.timeouts.supervisor_call, self.ports.supervisor.reload()).await {
                warnings.push(format!("reload failed: {e:#}"));
            }
        }

        UninstallReport {
            pool: self.config.pool_name.clone(),
            stop,
            instances: entries,
            units_removed,
            warnings,
        }
    }

    async fn remove_instance(
        &self,
        instance: &RunnerInstance,
        removal: Option<&RegistrationToken>,
    ) -> InstanceEntry {
        let dir = &instance.working_directory;
        if !self.ports.fs.has_identity(dir) {
            return InstanceEntry::succeeded(instance.index, &instance.name)
                .with_state(RegistrationState::Removed);
        }

        let mut warnings = Vec::new();
        if let Some(token) = removal {
            let removed = tokio::time::timeout(self.timeouts.agent_call, self.ports.agent.remove(dir, token))
                .await
                .unwrap_or_else(|_| Err(AgentError::Failed("remove timed out".to_string())));
            if let Err(e) = removed {
                warnings.push(format!("{}: remote deregistration: {e}", instance.name));
            }
        }

        if self.ports.fs.has_identity(dir)
            && let Err(e) = self.ports.fs.clear_identity(dir)
        {
            return InstanceEntry::failed(instance.index, &instance.name, format!("{e:#}"))
                .with_state(RegistrationState::Stale)
                .with_warnings(warnings);
        }
        InstanceEntry::succeeded(instance.index, &instance.name)
            .with_state(RegistrationState::Removed)
            .with_warnings(warnings)
    }
}
