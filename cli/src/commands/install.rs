//! `paco install`: write unit definitions and register every instance.

use std::process::ExitCode;

use anyhow::Result;
use paco_common::InstallReport;
use tokio_util::sync::CancellationToken;

use crate::app::AppContext;
use crate::commands::{EXIT_PARTIAL_FAILURE, exit_for};
use crate::domain::PoolError;
use crate::output::Renderer;

/// Run `paco install`.
///
/// Ctrl-C stops the run between instances; what was already registered
/// stays registered.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unavailable token broker
/// or unit-file write failures. When every instance failed the report is
/// still rendered and the exit code is 1.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let session = app.open_pool()?;
    let pool = app.orchestrator(&session);
    let reporter = app.reporter();

    let cancel = CancellationToken::new();
    let on_interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing current instance");
                cancel.cancel();
            }
        }
    });

    let result = pool.install(&reporter, &cancel).await;
    on_interrupt.abort();
    let report = match result {
        Ok(report) => report,
        Err(PoolError::AllInstancesFailed { report }) => {
            render(app, &report)?;
            app.output.error(&format!("all {} instances failed to register", report.instances.len()));
            return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
        }
        Err(e) => return Err(e.into()),
    };

    render(app, &report)?;
    if !report.cancelled {
        app.output.info("Start the pool: paco start");
    }

    if report.cancelled {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
    Ok(exit_for(&report))
}

fn render(app: &AppContext, report: &InstallReport) -> Result<()> {
    match app.renderer() {
        Renderer::Human(r) => r.render_install(report),
        Renderer::Json(r) => r.render(report)?,
    }
    Ok(())
}
