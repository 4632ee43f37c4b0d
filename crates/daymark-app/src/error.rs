//! Command-level error taxonomy.

use daymark_core::{IntervalError, ShapeError, TaskId};
use daymark_store::{JournalError, StoreError};
use thiserror::Error;

/// Why a command was rejected or failed.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Malformed command input.
    #[error("{0}")]
    InvalidArgument(String),

    /// The resulting task would match none of the four classes.
    #[error(transparent)]
    InvalidShape(#[from] ShapeError),

    /// The command references an absent or deleted task.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The schedule overlaps live tasks; nothing was committed.
    #[error("schedule conflicts with {}", describe_ids(.ids))]
    Conflict {
        /// Conflicting task ids, ascending.
        ids: Vec<TaskId>,
    },

    /// History is already at its start.
    #[error("nothing to undo")]
    NothingToUndo,

    /// History is already at its end.
    #[error("nothing to redo")]
    NothingToRedo,

    /// The journal could not be written or read.
    #[error(transparent)]
    Journal(JournalError),
}

impl CommandError {
    /// Shorthand for [`CommandError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether the error is reported to the user as a rejected command
    /// rather than propagated as a failure of the engine.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Journal(_))
    }
}

impl From<JournalError> for CommandError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::NothingToUndo => Self::NothingToUndo,
            JournalError::NothingToRedo => Self::NothingToRedo,
            JournalError::Store(StoreError::NotFound(id)) => Self::NotFound(id),
            other => Self::Journal(other),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
        }
    }
}

impl From<IntervalError> for CommandError {
    fn from(err: IntervalError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

fn describe_ids(ids: &[TaskId]) -> String {
    let list = ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    if ids.len() == 1 {
        format!("task {list}")
    } else {
        format!("tasks {list}")
    }
}
