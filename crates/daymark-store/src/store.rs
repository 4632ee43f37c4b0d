//! In-memory keyed store with soft-delete tombstones.

use std::collections::{BTreeMap, BTreeSet};

use daymark_core::{Task, TaskId};

use crate::error::StoreError;

/// Lifecycle of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordState {
    /// Visible to every read.
    Active,
    /// Tombstone kept so the delete can be undone.
    Deleted,
}

/// A task together with its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    /// Last known task value (the pre-delete snapshot for tombstones).
    pub(crate) task: Task,
    /// Lifecycle state.
    pub(crate) state: RecordState,
}

/// Mapping from ids to task records.
///
/// Callers are responsible for journaling; the store itself never touches disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedStore {
    records: BTreeMap<TaskId, Record>,
}

impl KeyedStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest id not held by any record, live or tombstoned.
    #[must_use]
    pub fn allocate_id(&self) -> TaskId {
        let mut candidate = TaskId(0);
        for id in self.records.keys() {
            if *id != candidate {
                break;
            }
            candidate = candidate.next();
        }
        candidate
    }

    /// Insert or overwrite the record at `id` as active.
    pub fn put(&mut self, id: TaskId, task: Task) {
        self.records.insert(
            id,
            Record {
                task,
                state: RecordState::Active,
            },
        );
    }

    /// Turn an active record into a tombstone, returning its last value.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if `id` is absent or already deleted.
    pub fn soft_delete(&mut self, id: TaskId) -> Result<Task, StoreError> {
        match self.records.get_mut(&id) {
            Some(record) if record.state == RecordState::Active => {
                record.state = RecordState::Deleted;
                Ok(record.task.clone())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }

    /// Bring a tombstone back to life with the given snapshot.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] unless `id` is currently a tombstone.
    pub fn restore(&mut self, id: TaskId, task: Task) -> Result<(), StoreError> {
        match self.records.get_mut(&id) {
            Some(record) if record.state == RecordState::Deleted => {
                *record = Record {
                    task,
                    state: RecordState::Active,
                };
                Ok(())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }

    /// Active task at `id`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if `id` is absent or deleted.
    pub fn get(&self, id: TaskId) -> Result<&Task, StoreError> {
        self.records
            .get(&id)
            .filter(|record| record.state == RecordState::Active)
            .map(|record| &record.task)
            .ok_or(StoreError::NotFound(id))
    }

    /// Whether `id` refers to an active record.
    #[must_use]
    pub fn is_active(&self, id: TaskId) -> bool {
        self.get(id).is_ok()
    }

    /// Whether `id` refers to a tombstone.
    #[must_use]
    pub fn is_tombstone(&self, id: TaskId) -> bool {
        self.records
            .get(&id)
            .is_some_and(|record| record.state == RecordState::Deleted)
    }

    /// Whether any record, live or deleted, holds `id`.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.records.contains_key(&id)
    }

    /// Active ids in ascending order.
    #[must_use]
    pub fn list_active_ids(&self) -> Vec<TaskId> {
        self.active().map(|(id, _)| id).collect()
    }

    /// Active ids accepted by `predicate`, ascending.
    pub fn list_active_ids_where<P>(&self, mut predicate: P) -> Vec<TaskId>
    where
        P: FnMut(TaskId, &Task) -> bool,
    {
        self.active()
            .filter(|(id, task)| predicate(*id, task))
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterate over active records in ascending id order.
    pub fn active(&self) -> impl Iterator<Item = (TaskId, &Task)> + '_ {
        self.records
            .iter()
            .filter(|(_, record)| record.state == RecordState::Active)
            .map(|(id, record)| (*id, &record.task))
    }

    /// Number of active records.
    #[must_use]
    pub fn len_active(&self) -> usize {
        self.active().count()
    }

    /// Number of tombstones.
    #[must_use]
    pub fn len_tombstones(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.state == RecordState::Deleted)
            .count()
    }

    /// Erase tombstones whose id is not in `referenced`, returning the erased ids.
    ///
    /// Called by compaction and when redo history is discarded; it is what
    /// makes an id reusable.
    pub fn purge_tombstones(&mut self, referenced: &BTreeSet<TaskId>) -> Vec<TaskId> {
        let doomed: Vec<TaskId> = self
            .records
            .iter()
            .filter(|(id, record)| record.state == RecordState::Deleted && !referenced.contains(id))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            self.records.remove(id);
        }
        doomed
    }
}
