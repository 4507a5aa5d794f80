//! paco - runner pool lifecycle manager

use std::process::ExitCode;

use clap::Parser;
use paco_cli::cli::{Cli, error_code, failure_code};
use paco_cli::logging;
use paco_cli::output::json::format_error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.no_color);
    let json = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            if json {
                match format_error(&format!("{e:#}"), error_code(&e)) {
                    Ok(doc) => println!("{doc}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(failure_code(&e))
        }
    }
}
