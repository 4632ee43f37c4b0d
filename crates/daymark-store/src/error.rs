//! Error types for the keyed store and its journal.

use daymark_core::TaskId;
use thiserror::Error;

/// Errors raised by [`KeyedStore`](crate::store::KeyedStore) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The id is absent or only a tombstone remains.
    #[error("task {0} not found")]
    NotFound(TaskId),
}

/// Errors raised by [`Journal`](crate::journal::Journal) operations.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Cursor already at the start of history.
    #[error("nothing to undo")]
    NothingToUndo,

    /// Cursor already at the end of history.
    #[error("nothing to redo")]
    NothingToRedo,

    /// The entry does not fit the current store contents.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entry payload does not match its operation kind.
    #[error("malformed {kind} entry for task {target}: {reason}")]
    Mismatch {
        /// Operation kind label.
        kind: &'static str,
        /// Target task.
        target: TaskId,
        /// What is wrong with the payload.
        reason: &'static str,
    },

    /// A record before the tail of the journal is unreadable.
    #[error("journal corrupted at line {line}: {reason}")]
    Corruption {
        /// One-based line number in the journal file.
        line: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Failed to serialize a record.
    #[error("failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Backing storage failed.
    #[error("journal storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// A failed write could not be rolled back; the journal must be reopened.
    #[error("journal storage holds an unacknowledged write; reopen to recover")]
    Poisoned,
}

impl JournalError {
    pub(crate) fn storage<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Storage(err.into())
    }
}
