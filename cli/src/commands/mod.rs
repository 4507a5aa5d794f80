//! Command implementations: one module per `paco` subcommand.

pub mod install;
pub mod kill;
pub mod logs;
pub mod start;
pub mod status;
pub mod stop;
pub mod uninstall;

use std::process::ExitCode;

use paco_common::Tally;

/// Exit status for any instance operation not fully successful.
pub const EXIT_PARTIAL_FAILURE: u8 = 1;

/// `0` if every instance succeeded, `1` otherwise.
#[must_use]
pub fn exit_for(report: &impl Tally) -> ExitCode {
    if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL_FAILURE)
    }
}
