//! Infrastructure implementation of the `Supervisor` port over systemd.
//!
//! Unit files are written to a unit directory (normally
//! `/etc/systemd/system`) with atomic temp-file + rename writes, and only
//! when their SHA-256 digest differs from what is already there. Lifecycle
//! calls go through `systemctl`; logs are streamed from `journalctl`.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::stream;
use paco_common::InstanceStatus;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::ports::{CommandRunner, LogOptions, LogStream, Supervisor, UnitChange};
use crate::domain::{Signal, UnitDefinition};
use crate::infra::command_runner::TokioCommandRunner;

/// Where systemd looks for administrator-provided units.
pub const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

/// `Supervisor` backed by `systemctl` and `journalctl`.
pub struct SystemdSupervisor<R: CommandRunner> {
    runner: R,
    unit_dir: PathBuf,
}

impl<R: CommandRunner> SystemdSupervisor<R> {
    pub fn new(runner: R, unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            unit_dir: unit_dir.into(),
        }
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(name)
    }

    /// Run `systemctl` and fail on a non-zero exit, quoting its stderr.
    async fn systemctl(&self, args: &[&str]) -> Result<Output> {
        let out = self.runner.run("systemctl", args).await?;
        ensure_success("systemctl", args, &out)?;
        Ok(out)
    }
}

impl Default for SystemdSupervisor<TokioCommandRunner> {
    fn default() -> Self {
        Self::new(TokioCommandRunner::default(), SYSTEM_UNIT_DIR)
    }
}

fn ensure_success(program: &str, args: &[&str], out: &Output) -> Result<()> {
    if out.status.success() {
        return Ok(());
    }
    anyhow::bail!(
        "{program} {} failed ({}): {}",
        args.join(" "),
        out.status,
        String::from_utf8_lossy(&out.stderr).trim()
    )
}

/// Write `content` to `path` unless the current file has the same digest.
fn write_if_changed(path: &Path, content: &[u8]) -> Result<UnitChange> {
    if let Ok(existing) = std::fs::read(path)
        && Sha256::digest(&existing) == Sha256::digest(content)
    {
        return Ok(UnitChange::Unchanged);
    }
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid unit path {}", path.display()))?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    temp.write_all(content)
        .with_context(|| format!("writing temp file for {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .with_context(|| format!("setting permissions for {}", path.display()))?;
    }

    temp.persist(path)
        .with_context(|| format!("finalizing unit file {}", path.display()))?;
    tracing::debug!(
        unit = %path.display(),
        sha256 = %format!("{:x}", Sha256::digest(content)),
        "unit file written"
    );
    Ok(UnitChange::Written)
}

/// `journalctl` argv for the given units and filters.
fn journal_args(names: &[String], options: &LogOptions) -> Vec<String> {
    let mut args: Vec<String> = names.iter().flat_map(|n| ["-u".to_string(), n.clone()]).collect();
    args.extend(["--no-pager".to_string(), "--output=short-iso".to_string()]);
    if let Some(lines) = options.lines {
        args.push(format!("--lines={lines}"));
    }
    if let Some(since) = &options.since {
        args.push(format!("--since={since}"));
    }
    if options.follow {
        args.push("--follow".to_string());
    }
    args
}

impl<R: CommandRunner> Supervisor for SystemdSupervisor<R> {
    async fn register(&self, unit: &UnitDefinition) -> Result<UnitChange> {
        write_if_changed(&self.unit_path(&unit.name), unit.render().as_bytes())
    }

    async fn reload(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"]).await.map(|_| ())
    }

    async fn unregister(&self, name: &str) -> Result<bool> {
        let path = self.unit_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.systemctl(&["start", name]).await.map(|_| ())
    }

    async fn stop(&self, name: &str, timeout: Duration) -> Result<()> {
        let args = ["stop", name];
        let out = self.runner.run_with_timeout("systemctl", &args, timeout).await?;
        ensure_success("systemctl", &args, &out)
    }

    async fn kill(&self, name: &str, signal: Signal) -> Result<()> {
        let flag = format!("--signal={}", signal.as_str());
        self.systemctl(&["kill", "--kill-whom=all", &flag, name])
            .await
            .map(|_| ())
    }

    async fn status(&self, name: &str) -> Result<InstanceStatus> {
        // `is-active` exits non-zero for anything but active; the word on
        // stdout is what matters.
        let out = self.runner.run("systemctl", &["is-active", name]).await?;
        let word = String::from_utf8_lossy(&out.stdout);
        Ok(InstanceStatus::from_supervisor_word(word.trim()))
    }

    async fn enable(&self, name: &str) -> Result<()> {
        self.systemctl(&["enable", name]).await.map(|_| ())
    }

    async fn disable(&self, name: &str) -> Result<()> {
        self.systemctl(&["disable", name]).await.map(|_| ())
    }

    fn logs(&self, names: &[String], options: &LogOptions) -> Result<LogStream> {
        let args = journal_args(names, options);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut child = self.runner.spawn("journalctl", &argv)?;
        let stdout = child
            .stdout
            .take()
            .context("journalctl stdout was not captured")?;
        let lines = BufReader::new(stdout).lines();

        // The child rides along in the stream state so it lives (and is
        // killed on drop) exactly as long as the stream.
        let stream = stream::unfold(Some((child, lines)), |state| async move {
            let (child, mut lines) = state?;
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some((child, lines)))),
                Ok(None) => None,
                Err(e) => Some((Err(anyhow::Error::from(e).context("reading journal")), None)),
            }
        });
        Ok(stream.boxed())
    }
}
