//! `paco logs`: stream supervisor log lines for one instance or the pool.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use futures_util::StreamExt;

use crate::app::AppContext;
use crate::application::ports::LogOptions;
use crate::application::services::pool::LogSelector;
use crate::domain::instance::parse_instance_index;
use crate::output::Renderer;

/// Arguments for the logs command.
#[derive(Args)]
pub struct LogsArgs {
    /// Instance index (`2`), instance name (`paco-runner-2`) or `all`
    #[arg(default_value = "all")]
    pub target: String,

    /// Stream logs in real time
    #[arg(short, long)]
    pub follow: bool,

    /// Show only the last N lines
    #[arg(short = 'n', long)]
    pub lines: Option<u32>,

    /// Show lines newer than this, e.g. "1 hour ago" or "2026-01-01 10:00"
    #[arg(long)]
    pub since: Option<String>,
}

/// Map the positional target to a selector for pool `pool_name`.
///
/// # Errors
///
/// Returns an error if `target` is neither `all`, a number, nor an
/// instance name of this pool.
pub fn parse_selector(pool_name: &str, target: &str) -> Result<LogSelector> {
    if target.eq_ignore_ascii_case("all") {
        return Ok(LogSelector::All);
    }
    if let Ok(index) = target.parse::<u8>() {
        return Ok(LogSelector::Instance(index));
    }
    let name = target.trim_end_matches(".service");
    parse_instance_index(pool_name, name)
        .map(LogSelector::Instance)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown instance '{target}': expected 'all', an index, or a name like {pool_name}-runner-1"
            )
        })
}

/// Run `paco logs`.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unknown target, or when
/// the log reader fails.
pub async fn run(app: &AppContext, args: LogsArgs) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let selector = parse_selector(&session.config.pool_name, &args.target)?;
    let options = LogOptions {
        follow: args.follow,
        lines: args.lines,
        since: args.since,
    };
    let mut lines = app.orchestrator(&session).logs(selector, &options)?;
    let renderer = app.renderer();

    loop {
        let next = tokio::select! {
            next = lines.next() => next,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = next else { break };
        let line = line?;
        match &renderer {
            Renderer::Human(_) => println!("{line}"),
            Renderer::Json(r) => r.render_log_line(&line)?,
        }
    }
    Ok(ExitCode::SUCCESS)
}
