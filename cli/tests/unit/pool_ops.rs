//! `start`, `status`, `kill`, `logs` and `uninstall`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use futures_util::StreamExt;
use paco_cli::application::ports::LogOptions;
use paco_cli::application::services::pool::LogSelector;
use paco_common::{InstanceStatus, Outcome, RegistrationState, StopOutcome, Tally};
use tokio_util::sync::CancellationToken;

use crate::helpers::{GROUP, Harness, RecordingReporter, unit};

// ── start ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_brings_up_every_instance_and_the_group() {
    let h = Harness::new(3);

    let report = h.pool().start().await;

    assert!(report.all_succeeded());
    assert!(report.warnings.is_empty());
    for u in h.all_units() {
        assert_eq!(h.supervisor.status_of(&u), InstanceStatus::Active, "{u}");
    }
}

#[tokio::test]
async fn start_reports_the_instance_that_failed() {
    let mut h = Harness::new(3);
    h.supervisor.failing_start.insert(unit(2));

    let report = h.pool().start().await;

    assert_eq!(report.summary(), "2 of 3 succeeded");
    assert_eq!(report.instances[1].outcome, Outcome::Failed);
    assert!(report.instances[1].error.as_deref().unwrap().contains("Job for"));
    assert_eq!(h.supervisor.status_of(&unit(3)), InstanceStatus::Active);
    assert_eq!(h.supervisor.calls_for(GROUP), ["start"]);
}

// ── status ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_each_unit_without_side_effects() {
    let h = Harness::new(3);
    h.supervisor.set_status(&unit(1), InstanceStatus::Active);
    h.supervisor.set_status(&unit(3), InstanceStatus::Failed);

    let status = h.pool().status().await;

    let statuses: Vec<InstanceStatus> = status.instances.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        [
            InstanceStatus::Active,
            InstanceStatus::Inactive,
            InstanceStatus::Failed
        ]
    );
    assert_eq!(status.active_count(), 1);
    assert_eq!(status.group.unit, GROUP);
    assert_eq!(status.group.index, None);
    assert_eq!(h.supervisor.calls().len(), h.all_units().len());
    assert_eq!(h.supervisor.count("status"), h.all_units().len());
}

#[tokio::test]
async fn status_query_failure_is_reported_per_unit() {
    let mut h = Harness::new(2);
    h.supervisor.failing_status.insert(unit(2));

    let status = h.pool().status().await;

    assert_eq!(status.instances[0].error, None);
    assert_eq!(status.instances[1].status, InstanceStatus::Inactive);
    assert!(
        status.instances[1]
            .error
            .as_deref()
            .unwrap()
            .contains("Failed to connect to bus")
    );
}

// ── kill ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn kill_signals_every_unit_without_stopping_it() {
    let h = Harness::new(2);
    h.mark_active(&h.all_units());

    let report = h.pool().kill().await;

    assert!(report.all_succeeded());
    assert!(report.group.signalled);
    assert_eq!(h.supervisor.count("stop"), 0);
    for u in h.all_units() {
        assert_eq!(h.supervisor.calls_for(&u), ["kill SIGKILL", "status"]);
    }
    assert!(
        report
            .instances
            .iter()
            .all(|e| e.status_after == Some(InstanceStatus::Inactive))
    );
}

// ── logs ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logs_for_all_include_the_group_unit() {
    let h = Harness::new(2);

    let lines: Vec<String> = h
        .pool()
        .logs(LogSelector::All, &LogOptions::default())
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with(GROUP));
    assert_eq!(
        h.supervisor.calls(),
        [format!("logs {},{},{GROUP}", unit(1), unit(2))]
    );
}

#[tokio::test]
async fn logs_for_one_instance_select_only_its_unit() {
    let h = Harness::new(3);
    let options = LogOptions {
        follow: true,
        lines: Some(50),
        since: None,
    };

    let mut stream = h.pool().logs(LogSelector::Instance(2), &options).unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "ci-runner-2.service: Listening for Jobs (follow=true)");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn logs_reject_an_index_outside_the_pool() {
    let h = Harness::new(3);

    for index in [0, 4] {
        let Err(err) = h.pool().logs(LogSelector::Instance(index), &LogOptions::default()) else {
            panic!("index {index} accepted");
        };
        assert!(err.to_string().contains("does not exist"));
    }
    assert!(h.supervisor.calls().is_empty());
}

// ── uninstall ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn uninstall_reverses_install() {
    let h = Harness::new(2);
    h.pool()
        .install(&RecordingReporter::default(), &CancellationToken::new())
        .await
        .unwrap();
    h.pool().start().await;

    let report = h.pool().uninstall(&RecordingReporter::default()).await;

    assert!(report.all_succeeded());
    assert!(report.warnings.is_empty());
    assert!(report.stop.instances.iter().all(|e| e.outcome == StopOutcome::Stopped));
    assert!(
        report
            .instances
            .iter()
            .all(|e| e.state == Some(RegistrationState::Removed))
    );
    assert_eq!(h.agent.removed.lock().unwrap().len(), 2);
    assert_eq!(h.fs.identity_count(), 0);
    assert_eq!(report.units_removed, 3);
    assert_eq!(h.supervisor.count("unregister"), 3);
    assert_eq!(h.supervisor.count("disable"), 3);
    assert_eq!(h.supervisor.calls().last().map(String::as_str), Some("reload"));
}

#[tokio::test]
async fn uninstall_cleans_up_locally_when_the_broker_is_down() {
    let mut h = Harness::new(2);
    h.control_plane.failing_from = Some(0);
    h.fs.add_identity("/opt/ci/ci-runner-1");
    let reporter = RecordingReporter::default();

    let report = h.pool().uninstall(&reporter).await;

    assert!(report.all_succeeded());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("removal token unavailable"));
    assert!(h.agent.removed.lock().unwrap().is_empty());
    assert_eq!(h.fs.identity_count(), 0);
    assert_eq!(report.units_removed, 0, "nothing was installed");
}

#[tokio::test]
async fn uninstall_reports_identity_that_could_not_be_removed() {
    let mut h = Harness::new(2);
    h.agent.remove_fails = true;
    h.fs.clear_fails = true;
    h.fs.add_identity("/opt/ci/ci-runner-2");

    let report = h.pool().uninstall(&RecordingReporter::default()).await;

    assert_eq!(report.summary(), "1 of 2 succeeded");
    let second = &report.instances[1];
    assert_eq!(second.outcome, Outcome::Failed);
    assert_eq!(second.state, Some(RegistrationState::Stale));
    assert!(second.warnings[0].contains("remote deregistration"));
}
