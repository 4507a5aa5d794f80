//! `paco uninstall`: stop, deregister and remove the whole pool.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::exit_for;
use crate::output::Renderer;

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Run `paco uninstall`.
///
/// # Errors
///
/// Returns an error for invalid configuration or a failed prompt.
pub async fn run(app: &AppContext, args: &UninstallArgs) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let config = &session.config;

    let prompt = format!(
        "Remove all {} instances of pool '{}' and their registrations?",
        config.instance_count, config.pool_name
    );
    if !(args.yes || app.non_interactive || app.confirm(&prompt, false)?) {
        app.output.info("Nothing removed.");
        return Ok(ExitCode::SUCCESS);
    }

    let report = app
        .orchestrator(&session)
        .uninstall(&app.reporter())
        .await;

    match app.renderer() {
        Renderer::Human(r) => r.render_uninstall(&report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(exit_for(&report))
}
