//! `paco stop`: bring the pool down, escalating to SIGKILL on timeout.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use paco_common::StopMode;

use crate::app::AppContext;
use crate::commands::exit_for;
use crate::output::{Renderer, progress};

/// Arguments for the stop command.
#[derive(Args)]
pub struct StopArgs {
    /// SIGKILL immediately instead of waiting for a graceful stop
    #[arg(long)]
    pub force: bool,
}

/// Run `paco stop`.
///
/// # Errors
///
/// Returns an error for invalid configuration.
pub async fn run(app: &AppContext, args: &StopArgs) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let pool = app.orchestrator(&session);
    let mode = if args.force {
        StopMode::Forced
    } else {
        StopMode::Graceful
    };

    let pb = progress::spinner_for(&app.output, "stopping instances...");
    let report = pool.stop(mode).await;
    pb.finish_and_clear();

    match app.renderer() {
        Renderer::Human(r) => r.render_stop(&report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(exit_for(&report))
}
