//! `paco kill`: SIGKILL every agent process, bypassing the stop path.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::exit_for;
use crate::output::Renderer;

/// Run `paco kill`.
///
/// For agents stuck mid-job that ignore SIGTERM. Units keep their restart
/// policy, so they come back with fresh agent processes.
///
/// # Errors
///
/// Returns an error for invalid configuration.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let report = app.orchestrator(&session).kill().await;

    match app.renderer() {
        Renderer::Human(r) => r.render_kill(&report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(exit_for(&report))
}
