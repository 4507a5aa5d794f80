//! Progress events from the pool services, printed through `OutputContext`.

use crate::application::ports::ProgressReporter;
use crate::output::{Mark, OutputContext};

/// `ProgressReporter` for the terminal. Warnings stay visible under
/// `--quiet` and `--json` because they describe partial pool failures.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.ctx.line(Mark::Step, message);
    }

    fn success(&self, message: &str) {
        self.ctx.line(Mark::Done, message);
    }

    fn warn(&self, message: &str) {
        self.ctx.line(Mark::Warning, message);
    }
}
