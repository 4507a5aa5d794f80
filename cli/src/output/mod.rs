//! Terminal output: marked message lines, spinners, and the human and JSON
//! report renderers.

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Leading glyph of a message line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Done,
    Warning,
    Failure,
    Note,
    Step,
}

impl Mark {
    #[must_use]
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Done => "✓",
            Self::Warning => "!",
            Self::Failure => "✗",
            Self::Note => "·",
            Self::Step => "→",
        }
    }

    /// Warnings and failures go to stderr and survive `--quiet`.
    #[must_use]
    pub fn is_problem(self) -> bool {
        matches!(self, Self::Warning | Self::Failure)
    }
}

/// Where and how to print for this invocation.
pub struct OutputContext {
    pub styles: Styles,
    /// stdout is a terminal.
    pub is_tty: bool,
    /// Only problems are printed.
    pub quiet: bool,
}

impl OutputContext {
    /// Colours need a terminal and neither `--no-color` nor `NO_COLOR`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let mut styles = Styles::default();
        if is_tty && !no_color && std::env::var_os("NO_COLOR").is_none() {
            styles.colorize();
        }
        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print `msg` behind `mark`. Problems go to stderr even when quiet.
    pub fn line(&self, mark: Mark, msg: &str) {
        let style = match mark {
            Mark::Done => self.styles.ok,
            Mark::Warning => self.styles.attention,
            Mark::Failure => self.styles.failure,
            Mark::Note | Mark::Step => self.styles.progress,
        };
        let glyph_text = mark.glyph();
        let glyph = glyph_text.style(style);
        if mark.is_problem() {
            eprintln!("  {glyph} {msg}");
        } else if !self.quiet {
            println!("  {glyph} {msg}");
        }
    }

    pub fn success(&self, msg: &str) {
        self.line(Mark::Done, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line(Mark::Warning, msg);
    }

    pub fn error(&self, msg: &str) {
        self.line(Mark::Failure, msg);
    }

    pub fn info(&self, msg: &str) {
        self.line(Mark::Note, msg);
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("  {}", title.style(self.styles.title));
        }
    }

    /// `label` muted, `value` plain; used for the pool summary lines.
    pub fn kv(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", label.style(self.styles.muted));
        }
    }
}

/// Human or JSON rendering, chosen once per invocation.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}
