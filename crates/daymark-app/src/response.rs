//! Presentation-agnostic command result.

use crate::error::CommandError;

/// What a front end should show after a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Status lines, in order.
    pub messages: Vec<String>,
    /// Heading of the task listing, if any.
    pub view_summary: Option<String>,
    /// Tabular task listing, if any.
    pub view_body: Option<String>,
    /// Replace the whole buffer instead of appending.
    pub overwrite: bool,
    /// The session should end.
    pub exit: bool,
    /// The command was refused; nothing changed.
    pub rejected: bool,
}

impl Response {
    /// Response with a single status line.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            messages: vec![text.into()],
            ..Self::default()
        }
    }

    /// Response describing why a command was refused.
    #[must_use]
    pub fn rejected(err: &CommandError) -> Self {
        let text = match err {
            CommandError::NothingToUndo => "Nothing to undo.".to_owned(),
            CommandError::NothingToRedo => "Nothing to redo.".to_owned(),
            other => format!("Rejected: {other}."),
        };
        Self {
            rejected: true,
            ..Self::message(text)
        }
    }

    /// Attach a listing.
    #[must_use]
    pub fn with_view(mut self, summary: impl Into<String>, body: Option<String>) -> Self {
        self.view_summary = Some(summary.into());
        self.view_body = body;
        self
    }

    /// Ask the front end to replace its buffer.
    #[must_use]
    pub const fn overwriting(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Ask the front end to stop.
    #[must_use]
    pub const fn exiting(mut self) -> Self {
        self.exit = true;
        self
    }

    /// Everything in display order, one line per entry.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.messages.iter().map(String::as_str).collect();
        if let Some(summary) = &self.view_summary {
            lines.push(summary);
        }
        if let Some(body) = &self.view_body {
            lines.extend(body.lines());
        }
        lines
    }
}
