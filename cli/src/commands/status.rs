//! `paco status`: read-only view of every instance unit and the group.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::EXIT_PARTIAL_FAILURE;
use crate::output::Renderer;

/// Run `paco status`.
///
/// Exits 0 whenever the supervisor answered for every unit, whatever the
/// states; 1 if any unit could not be queried.
///
/// # Errors
///
/// Returns an error for invalid configuration.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let status = app.orchestrator(&session).status().await;

    match app.renderer() {
        Renderer::Human(r) => r.render_status(&status),
        Renderer::Json(r) => r.render(&status)?,
    }

    let unanswered = status
        .instances
        .iter()
        .chain(std::iter::once(&status.group))
        .any(|e| e.error.is_some());
    if unanswered {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}
