//! `paco start`: start every instance unit and the group.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::exit_for;
use crate::output::{Renderer, progress};

/// Run `paco start`.
///
/// # Errors
///
/// Returns an error for invalid configuration.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let pool = app.orchestrator(&session);

    let pb = progress::spinner_for(&app.output, "starting instances...");
    let report = pool.start().await;
    pb.finish_and_clear();

    match app.renderer() {
        Renderer::Human(r) => r.render_start(&report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(exit_for(&report))
}
