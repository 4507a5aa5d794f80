//! Infrastructure implementation of the `ProcessSignaller` port via `pkill`.

use anyhow::Result;

use crate::application::ports::{CommandRunner, ProcessSignaller};
use crate::infra::command_runner::TokioCommandRunner;

/// Signals processes by full command line with `pkill -TERM -f`.
pub struct PkillSignaller<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> PkillSignaller<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl Default for PkillSignaller<TokioCommandRunner> {
    fn default() -> Self {
        Self::new(TokioCommandRunner::default())
    }
}

impl<R: CommandRunner> ProcessSignaller for PkillSignaller<R> {
    async fn terminate_matching(&self, pattern: &str) -> Result<bool> {
        // pkill treats the pattern as an extended regex; paths contain dots.
        let escaped = regex::escape(pattern);
        let out = self.runner.run("pkill", &["-TERM", "-f", &escaped]).await?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            code => anyhow::bail!(
                "pkill exited with {code:?}: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        }
    }
}
