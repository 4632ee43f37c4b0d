//! Journal entries and the on-disk record envelope.

use std::fmt;

use daymark_core::{Task, TaskId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::JournalError;

/// Kind of reversible store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// A task comes into existence.
    Create,
    /// A task value is replaced.
    Update,
    /// A task becomes a tombstone.
    Delete,
    /// The completion flag changes.
    Mark,
}

impl OpKind {
    /// Lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Mark => "mark",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One durably recorded, reversible mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in history, starting at 1.
    pub sequence: u64,
    /// Operation kind.
    pub kind: OpKind,
    /// Task the operation targets.
    pub target: TaskId,
    /// Value before the operation (absent for create).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Task>,
    /// Value after the operation (absent for delete).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Task>,
    /// When the entry was journaled.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl JournalEntry {
    /// Build an entry, checking that `before`/`after` fit `kind`.
    ///
    /// # Errors
    /// Returns [`JournalError::Mismatch`] when a required snapshot is missing
    /// or a forbidden one is present.
    pub fn new(
        sequence: u64,
        kind: OpKind,
        target: TaskId,
        before: Option<Task>,
        after: Option<Task>,
        recorded_at: OffsetDateTime,
    ) -> Result<Self, JournalError> {
        let entry = Self {
            sequence,
            kind,
            target,
            before,
            after,
            recorded_at,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Check the payload shape against the kind.
    ///
    /// # Errors
    /// Returns [`JournalError::Mismatch`] describing the first problem found.
    pub fn validate(&self) -> Result<(), JournalError> {
        let reason = match (self.kind, &self.before, &self.after) {
            (OpKind::Create, Some(_), _) => Some("create must not carry a before snapshot"),
            (OpKind::Create, None, None) => Some("create needs an after snapshot"),
            (OpKind::Delete, _, Some(_)) => Some("delete must not carry an after snapshot"),
            (OpKind::Delete, None, None) => Some("delete needs a before snapshot"),
            (OpKind::Update | OpKind::Mark, None, _) => Some("missing before snapshot"),
            (OpKind::Update | OpKind::Mark, _, None) => Some("missing after snapshot"),
            _ => None,
        };
        reason.map_or(Ok(()), |reason| {
            Err(JournalError::Mismatch {
                kind: self.kind.as_str(),
                target: self.target,
                reason,
            })
        })
    }

    /// One-line human summary, e.g. `update task 3 "Project meeting"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let description = self
            .after
            .as_ref()
            .or(self.before.as_ref())
            .map(Task::description)
            .unwrap_or_default();
        format!("{} task {} \"{}\"", self.kind, self.target, description)
    }
}

/// Active task captured in a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineTask {
    /// Record id.
    pub id: TaskId,
    /// Task value.
    pub task: Task,
}

/// A line of the journal file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalRecord {
    /// Folded history written by compaction; only valid as the first line.
    Baseline {
        /// Sequence number of the last folded entry.
        sequence: u64,
        /// Active tasks after the folded entries, ascending by id.
        tasks: Vec<BaselineTask>,
    },
    /// A forward operation. Implies history was cut to `sequence - 1` first.
    Entry(JournalEntry),
    /// The cursor moved by undo or redo.
    Cursor {
        /// Sequence number of the last applied entry.
        position: u64,
    },
}

impl JournalRecord {
    /// Serialize as a single newline-terminated JSON line.
    ///
    /// # Errors
    /// Returns [`JournalError::Encode`] when serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, JournalError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2024-08-01 9:00 UTC);

    fn task() -> Task {
        Task::new("Project meeting", Vec::new(), AT).unwrap_or_else(|err| panic!("{err}"))
    }

    #[test]
    fn payload_must_match_kind() {
        assert!(JournalEntry::new(1, OpKind::Create, TaskId(0), None, Some(task()), AT).is_ok());
        assert!(JournalEntry::new(1, OpKind::Create, TaskId(0), Some(task()), Some(task()), AT).is_err());
        assert!(JournalEntry::new(1, OpKind::Delete, TaskId(0), Some(task()), None, AT).is_ok());
        assert!(JournalEntry::new(1, OpKind::Delete, TaskId(0), None, None, AT).is_err());
        assert!(JournalEntry::new(1, OpKind::Mark, TaskId(0), Some(task()), None, AT).is_err());
        assert!(JournalEntry::new(1, OpKind::Update, TaskId(0), Some(task()), Some(task()), AT).is_ok());
    }

    #[test]
    fn records_are_tagged_single_lines() {
        let entry = JournalEntry::new(3, OpKind::Create, TaskId(2), None, Some(task()), AT)
            .unwrap_or_else(|err| panic!("{err}"));
        let line = JournalRecord::Entry(entry.clone())
            .to_line()
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|byte| **byte == b'\n').count(), 1);

        let value: serde_json::Value = serde_json::from_slice(&line).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(value["type"], "entry");
        assert_eq!(value["kind"], "create");
        assert!(value.get("before").is_none());

        let back: JournalRecord = serde_json::from_slice(&line).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(back, JournalRecord::Entry(entry));
    }

    #[test]
    fn summary_prefers_the_after_snapshot() {
        let entry = JournalEntry::new(1, OpKind::Delete, TaskId(5), Some(task()), None, AT)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(entry.summary(), "delete task 5 \"Project meeting\"");
    }
}
