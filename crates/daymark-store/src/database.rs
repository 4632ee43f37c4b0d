//! Store and journal bundled behind a single mutation path.

use daymark_core::{Task, TaskId};
use time::OffsetDateTime;

use crate::conflict;
use crate::entry::{JournalEntry, OpKind};
use crate::error::JournalError;
use crate::journal::{CompactionReport, Journal};
use crate::storage::JournalStorage;
use crate::store::KeyedStore;

/// Owns the task store and the journal that makes it durable.
///
/// After [`Database::open`] the only way to change the store is through
/// [`commit`](Self::commit), [`undo`](Self::undo), [`redo`](Self::redo) and
/// [`compact`](Self::compact), so the journal always describes it.
#[derive(Debug)]
pub struct Database<S> {
    store: KeyedStore,
    journal: Journal<S>,
}

impl<S: JournalStorage> Database<S> {
    /// Recover from `storage`.
    ///
    /// # Errors
    /// See [`Journal::open`].
    pub fn open(storage: S) -> Result<Self, JournalError> {
        let (journal, store) = Journal::open(storage)?;
        Ok(Self { store, journal })
    }

    /// Read-only view of the live store.
    #[must_use]
    pub const fn store(&self) -> &KeyedStore {
        &self.store
    }

    /// Read-only view of the journal.
    #[must_use]
    pub const fn journal(&self) -> &Journal<S> {
        &self.journal
    }

    /// Next id a create would use.
    #[must_use]
    pub fn allocate_id(&self) -> TaskId {
        self.store.allocate_id()
    }

    /// Journal and apply one forward operation.
    ///
    /// # Errors
    /// See [`Journal::commit`]; on error neither the store nor the journal changed.
    pub fn commit(
        &mut self,
        kind: OpKind,
        target: TaskId,
        before: Option<Task>,
        after: Option<Task>,
        recorded_at: OffsetDateTime,
    ) -> Result<JournalEntry, JournalError> {
        self.journal
            .commit(&mut self.store, kind, target, before, after, recorded_at)
    }

    /// Revert the most recent applied entry.
    ///
    /// # Errors
    /// See [`Journal::undo`].
    pub fn undo(&mut self) -> Result<JournalEntry, JournalError> {
        self.journal.undo(&mut self.store)
    }

    /// Re-apply the next undone entry.
    ///
    /// # Errors
    /// See [`Journal::redo`].
    pub fn redo(&mut self) -> Result<JournalEntry, JournalError> {
        self.journal.redo(&mut self.store)
    }

    /// Fold history older than `retain` undo steps.
    ///
    /// # Errors
    /// See [`Journal::compact`].
    pub fn compact(&mut self, retain: usize) -> Result<CompactionReport, JournalError> {
        self.journal.compact(&mut self.store, retain)
    }

    /// Whether `candidate` would overlap a live schedule other than `exclude`.
    #[must_use]
    pub fn has_conflict(&self, candidate: &Task, exclude: Option<TaskId>) -> bool {
        conflict::has_conflict(&self.store, candidate, exclude)
    }

    /// Ids of the live schedules `candidate` would overlap.
    #[must_use]
    pub fn conflicts_with(&self, candidate: &Task, exclude: Option<TaskId>) -> Vec<TaskId> {
        conflict::find_conflicts(&self.store, candidate, exclude)
    }
}
