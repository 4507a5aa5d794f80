//! Colour palette, keyed by what the text means for the pool.

use owo_colors::Style;
use paco_common::{InstanceStatus, StopOutcome};

/// Plain by default; [`Styles::colorize`] fills in colours.
#[derive(Default, Clone)]
pub struct Styles {
    pub ok: Style,
    pub attention: Style,
    pub failure: Style,
    pub progress: Style,
    pub muted: Style,
    pub title: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        *self = Self {
            ok: Style::new().green(),
            attention: Style::new().yellow(),
            failure: Style::new().red(),
            progress: Style::new().cyan(),
            muted: Style::new().dimmed(),
            title: Style::new().bold(),
        };
    }

    /// Running is good, stopped needs a look, failed is bad.
    #[must_use]
    pub fn for_status(&self, status: InstanceStatus) -> Style {
        match status {
            InstanceStatus::Active => self.ok,
            InstanceStatus::Inactive => self.attention,
            InstanceStatus::Failed => self.failure,
        }
    }

    /// A SIGKILL still brought the unit down, so it is highlighted, not failed.
    #[must_use]
    pub fn for_stop(&self, outcome: StopOutcome) -> Style {
        match outcome {
            StopOutcome::AlreadyStopped | StopOutcome::Stopped => self.ok,
            StopOutcome::Killed => self.attention,
            StopOutcome::NotStopped => self.failure,
        }
    }
}
