//! Per-instance registration: stale identity cleanup, stray processes and the
//! agent's register call.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use paco_cli::application::services::instance_controller::InstanceController;
use paco_cli::domain::{
    AgentError, CleanupStage, PoolConfigFile, RegistrationToken, RunnerInstance, TokenKind,
    TokenPair,
};
use paco_common::RegistrationState;

use crate::helpers::{
    Harness, StubAgent, StubFs, StubProcesses, fast_timeouts, org_file, resolve,
};

fn tokens() -> TokenPair {
    TokenPair {
        registration: RegistrationToken::new(TokenKind::Registration, "reg-1"),
        removal: RegistrationToken::new(TokenKind::Removal, "rm-1"),
    }
}

fn controller(h: &Harness) -> InstanceController<'_, StubAgent, StubFs, StubProcesses> {
    InstanceController::new(&h.agent, &h.fs, &h.processes, &h.config, fast_timeouts())
}

#[tokio::test]
async fn fresh_instance_registers_without_cleanup() {
    let h = Harness::new(2);
    let mut instance = RunnerInstance::new(&h.config, 1);

    let warnings = controller(&h).configure(&mut instance, &tokens()).await.unwrap();

    assert!(warnings.is_empty());
    assert_eq!(instance.registration_state, RegistrationState::Registered);
    assert!(instance.credentials_present);
    assert!(h.agent.removed.lock().unwrap().is_empty());
    let configured = h.agent.configured.lock().unwrap();
    assert_eq!(configured.len(), 1);
    assert_eq!(configured[0].name, "ci-runner-1");
    assert_eq!(configured[0].token, "reg-1");
    assert_eq!(configured[0].url, "https://github.com/acme");
    assert_eq!(configured[0].labels, "self-hosted,linux");
    assert!(configured[0].replace);
}

#[tokio::test]
async fn stray_process_pattern_is_anchored_to_the_instance_directory() {
    let h = Harness::new(10);
    let mut instance = RunnerInstance::new(&h.config, 1);

    controller(&h).configure(&mut instance, &tokens()).await.unwrap();

    let patterns = h.processes.patterns.lock().unwrap();
    assert_eq!(patterns.as_slice(), ["/opt/ci/ci-runner-1/"]);
    assert!(!"/opt/ci/ci-runner-10/bin/Runner.Listener".contains(patterns[0].as_str()));
}

#[tokio::test]
async fn stale_identity_is_deregistered_and_wiped_before_registering() {
    let h = Harness::new(2);
    h.fs.add_identity("/opt/ci/ci-runner-2");
    let mut instance = RunnerInstance::new(&h.config, 2);

    let warnings = controller(&h).configure(&mut instance, &tokens()).await.unwrap();

    assert!(warnings.is_empty());
    let removed = h.agent.removed.lock().unwrap();
    assert_eq!(
        removed.as_slice(),
        [(PathBuf::from("/opt/ci/ci-runner-2"), "rm-1".to_string())]
    );
    assert_eq!(instance.registration_state, RegistrationState::Registered);
}

#[tokio::test]
async fn failed_remote_removal_still_wipes_local_identity() {
    let mut h = Harness::new(1);
    h.agent.remove_fails = true;
    h.fs.add_identity("/opt/ci/ci-runner-1");
    let mut instance = RunnerInstance::new(&h.config, 1);

    let warnings = controller(&h).configure(&mut instance, &tokens()).await.unwrap();

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, CleanupStage::RemoteDeregistration);
    assert_eq!(warnings[0].instance_name, "ci-runner-1");
    assert_eq!(
        h.fs.cleared.lock().unwrap().as_slice(),
        [PathBuf::from("/opt/ci/ci-runner-1")]
    );
    assert_eq!(instance.registration_state, RegistrationState::Registered);
}

#[tokio::test]
async fn every_cleanup_failure_is_a_warning_not_an_error() {
    let mut h = Harness::new(1);
    h.agent.remove_fails = true;
    h.fs.clear_fails = true;
    h.processes.fails = true;
    h.fs.add_identity("/opt/ci/ci-runner-1");
    let mut instance = RunnerInstance::new(&h.config, 1);

    let warnings = controller(&h).configure(&mut instance, &tokens()).await.unwrap();

    let stages: Vec<CleanupStage> = warnings.iter().map(|w| w.stage).collect();
    assert_eq!(
        stages,
        [
            CleanupStage::RemoteDeregistration,
            CleanupStage::LocalIdentityRemoval,
            CleanupStage::ProcessTermination,
        ]
    );
    assert_eq!(h.agent.configured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn register_failure_leaves_instance_unconfigured() {
    let mut h = Harness::new(1);
    h.agent.failing.insert("ci-runner-1".to_string());
    let mut instance = RunnerInstance::new(&h.config, 1);

    let err = controller(&h)
        .configure(&mut instance, &tokens())
        .await
        .unwrap_err();

    assert_eq!(err.instance_name, "ci-runner-1");
    assert!(matches!(err.cause, AgentError::Failed(_)));
    assert!(!err.is_token_rejected());
    assert_eq!(instance.registration_state, RegistrationState::Unconfigured);
}

#[tokio::test]
async fn rejected_token_is_flagged_for_refetch() {
    let mut h = Harness::new(1);
    h.agent.rejected_tokens.insert("reg-1".to_string());
    let mut instance = RunnerInstance::new(&h.config, 1);

    let err = controller(&h)
        .configure(&mut instance, &tokens())
        .await
        .unwrap_err();

    assert!(err.is_token_rejected());
}

#[tokio::test]
async fn group_is_passed_only_for_organization_targets() {
    let org = resolve(&PoolConfigFile {
        group: Some("linux-x64".to_string()),
        ..org_file(1)
    });
    let h = Harness::with_config(org);
    let mut instance = RunnerInstance::new(&h.config, 1);
    controller(&h).configure(&mut instance, &tokens()).await.unwrap();
    assert_eq!(
        h.agent.configured.lock().unwrap()[0].group.as_deref(),
        Some("linux-x64")
    );

    let repo = resolve(&PoolConfigFile {
        registration_org: None,
        registration_repo_url: Some("https://github.com/acme/widgets".to_string()),
        group: Some("linux-x64".to_string()),
        ..org_file(1)
    });
    let h = Harness::with_config(repo);
    let mut instance = RunnerInstance::new(&h.config, 1);
    controller(&h).configure(&mut instance, &tokens()).await.unwrap();
    let configured = h.agent.configured.lock().unwrap();
    assert_eq!(configured[0].group, None);
    assert_eq!(configured[0].url, "https://github.com/acme/widgets");
}
