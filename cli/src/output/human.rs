//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use paco_common::{
    InstallReport, InstanceEntry, InstanceStatus, KillReport, Outcome, StartReport, StatusOutput,
    StopEntry, StopOutcome, StopReport, Tally, UninstallReport,
};

use crate::output::OutputContext;

/// Renders reports as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_install(&self, report: &InstallReport) {
        println!();
        self.ctx.header(&format!("Install: {}", report.pool));
        self.render_entries(&report.instances);
        for w in &report.warnings {
            self.ctx.warn(w);
        }
        if report.cancelled {
            self.ctx.warn("cancelled; re-run `paco install` to finish the remaining instances");
        }
        if report.token_refetches > 0 {
            self.ctx.info(&format!(
                "registration token re-fetched {} time(s)",
                report.token_refetches
            ));
        }
        self.render_tally(report);
    }

    pub fn render_start(&self, report: &StartReport) {
        self.render_entries(&report.instances);
        for w in &report.warnings {
            self.ctx.warn(w);
        }
        self.render_tally(report);
    }

    pub fn render_stop(&self, report: &StopReport) {
        for entry in &report.instances {
            self.render_stop_entry(entry);
        }
        self.render_stop_entry(&report.group);
        self.render_tally(report);
    }

    pub fn render_kill(&self, report: &KillReport) {
        for entry in report.instances.iter().chain(std::iter::once(&report.group)) {
            let after = entry.status_after.map_or("unknown", InstanceStatus::as_str);
            match &entry.error {
                None => self.ctx.success(&format!("{:<24} SIGKILL sent, now {after}", entry.name)),
                Some(err) => self.ctx.warn(&format!("{:<24} {err}", entry.name)),
            }
        }
        self.render_tally(report);
    }

    pub fn render_status(&self, status: &StatusOutput) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.kv(
            "Pool:",
            &format!(
                "{} ({} of {} active)",
                status.pool,
                status.active_count(),
                status.instances.len()
            ),
        );
        self.ctx.kv(
            "Group:",
            &format!(
                "{} {}",
                status.group.unit,
                status_display(status.group.status).style(self.ctx.styles.for_status(status.group.status))
            ),
        );
        println!();
        for entry in &status.instances {
            let word = status_display(entry.status);
            let detail = entry
                .error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default();
            println!(
                "  {:<24} {}{}",
                entry.name,
                word.style(self.ctx.styles.for_status(entry.status)),
                detail.style(self.ctx.styles.muted)
            );
        }
    }

    pub fn render_uninstall(&self, report: &UninstallReport) {
        self.render_stop(&report.stop);
        self.render_entries(&report.instances);
        for w in &report.warnings {
            self.ctx.warn(w);
        }
        self.ctx
            .info(&format!("{} unit definition(s) removed", report.units_removed));
        self.render_tally(report);
    }

    fn render_entries(&self, entries: &[InstanceEntry]) {
        for entry in entries {
            match entry.outcome {
                Outcome::Succeeded => {
                    let state = entry.state.map(|s| format!(" ({s})")).unwrap_or_default();
                    self.ctx.success(&format!("{}{state}", entry.name));
                }
                Outcome::Failed => self.ctx.error(&format!(
                    "{}: {}",
                    entry.name,
                    entry.error.as_deref().unwrap_or("failed")
                )),
                Outcome::Skipped => self.ctx.warn(&format!("{}: skipped", entry.name)),
            }
        }
    }

    fn render_stop_entry(&self, entry: &StopEntry) {
        let line = format!(
            "{:<24} {}",
            entry.name,
            stop_outcome_display(entry.outcome).style(self.ctx.styles.for_stop(entry.outcome))
        );
        if entry.is_down() {
            self.ctx.success(&line);
        } else {
            self.ctx.error(&line);
        }
        for err in &entry.errors {
            self.ctx.kv("   ", err);
        }
    }

    fn render_tally(&self, report: &impl Tally) {
        if !self.ctx.quiet {
            println!();
        }
        if report.all_succeeded() {
            self.ctx.success(&report.summary());
        } else {
            self.ctx.error(&report.summary());
        }
    }
}

#[must_use]
pub fn status_display(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Active => "Active",
        InstanceStatus::Failed => "Failed",
        InstanceStatus::Inactive => "Inactive",
    }
}

#[must_use]
pub fn stop_outcome_display(outcome: StopOutcome) -> &'static str {
    match outcome {
        StopOutcome::AlreadyStopped => "already stopped",
        StopOutcome::Stopped => "stopped",
        StopOutcome::Killed => "killed after timeout",
        StopOutcome::NotStopped => "still running",
    }
}
