//! Infrastructure implementation of the `AgentCli` port: the runner agent's
//! own `config.sh` script inside each instance directory.

use std::path::Path;
use std::process::Output;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::application::ports::{AgentCli, AgentRegistration, CommandRunner};
use crate::domain::{AgentError, RegistrationToken};
use crate::infra::command_runner::TokioCommandRunner;

/// Agent configuration script, relative to the instance directory.
pub const CONFIG_SCRIPT: &str = "config.sh";

/// The agent's report of an HTTP 401/404 from the control plane.
static TOKEN_REJECTED_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Http response code: (NotFound|Unauthorized)\b").ok());

/// Runs `config.sh` directly (as root, with the agent's root guard lifted)
/// or through `runuser` when a service user is configured.
pub struct RunnerAgent<R: CommandRunner> {
    runner: R,
    run_as_user: Option<String>,
    timeout: Duration,
}

impl<R: CommandRunner> RunnerAgent<R> {
    pub fn new(runner: R, run_as_user: Option<String>, timeout: Duration) -> Self {
        Self {
            runner,
            run_as_user,
            timeout,
        }
    }

    /// Program and argv prefix that launches `script` as the right user.
    fn launcher(&self, script: &str) -> (&'static str, Vec<String>) {
        match &self.run_as_user {
            Some(user) => (
                "runuser",
                vec!["-u".to_string(), user.clone(), "--".to_string(), script.to_string()],
            ),
            None => (
                "env",
                vec!["RUNNER_ALLOW_RUNASROOT=1".to_string(), script.to_string()],
            ),
        }
    }

    async fn invoke(
        &self,
        work_dir: &Path,
        args: Vec<String>,
        token: &RegistrationToken,
    ) -> Result<(), AgentError> {
        let script = work_dir.join(CONFIG_SCRIPT);
        let (program, mut argv) = self.launcher(&script.to_string_lossy());
        argv.extend(args);
        let argv: Vec<&str> = argv.iter().map(String::as_str).collect();

        let out = self
            .runner
            .run_with_timeout(program, &argv, self.timeout)
            .await
            .map_err(|e| AgentError::Failed(format!("{e:#}")))?;
        if out.status.success() {
            return Ok(());
        }
        Err(classify_failure(&out, token))
    }
}

impl Default for RunnerAgent<TokioCommandRunner> {
    fn default() -> Self {
        Self::new(
            TokioCommandRunner::default(),
            None,
            crate::domain::Timeouts::default().agent_call,
        )
    }
}

impl<R: CommandRunner> AgentCli for RunnerAgent<R> {
    async fn configure(&self, registration: &AgentRegistration<'_>) -> Result<(), AgentError> {
        let mut args = vec![
            "--unattended".to_string(),
            "--url".to_string(),
            registration.url.to_string(),
            "--token".to_string(),
            registration.token.expose().to_string(),
            "--name".to_string(),
            registration.name.to_string(),
            "--work".to_string(),
            "_work".to_string(),
        ];
        if !registration.labels.is_empty() {
            args.push("--labels".to_string());
            args.push(registration.labels.joined());
        }
        if let Some(group) = registration.group {
            args.push("--runnergroup".to_string());
            args.push(group.to_string());
        }
        if registration.replace {
            args.push("--replace".to_string());
        }
        self.invoke(registration.work_dir, args, registration.token).await
    }

    async fn remove(&self, work_dir: &Path, token: &RegistrationToken) -> Result<(), AgentError> {
        let args = vec![
            "remove".to_string(),
            "--token".to_string(),
            token.expose().to_string(),
        ];
        self.invoke(work_dir, args, token).await
    }
}

/// Last meaningful line of agent output, with the token scrubbed, classified
/// as a token rejection when the agent reports an HTTP 401/404 response.
fn classify_failure(out: &Output, token: &RegistrationToken) -> AgentError {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let combined = format!("{stdout}\n{stderr}");
    let message = combined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .next_back()
        .map_or_else(
            || format!("config.sh exited with {:?}", out.status.code()),
            ToString::to_string,
        )
        .replace(token.expose(), "***");

    if TOKEN_REJECTED_RE
        .as_ref()
        .is_some_and(|re| re.is_match(&combined))
    {
        AgentError::TokenRejected(message)
    } else {
        AgentError::Failed(message)
    }
}
