//! Append-only journal giving every store mutation durable undo/redo.
//!
//! The journal file is a sequence of JSON lines (see [`JournalRecord`]):
//!
//! * an optional `baseline` written by compaction,
//! * `entry` records, each implying the history was cut back to
//!   `sequence - 1` before it was appended,
//! * `cursor` records written by undo and redo.
//!
//! Replaying the lines in order therefore reproduces the linear history and
//! the cursor exactly. Nothing touches the in-memory store before the
//! corresponding bytes are flushed.

use std::collections::BTreeSet;

use daymark_core::{Task, TaskId};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::entry::{BaselineTask, JournalEntry, JournalRecord, OpKind};
use crate::error::JournalError;
use crate::storage::JournalStorage;
use crate::store::KeyedStore;

/// Outcome of [`Journal::compact`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Entries folded into the baseline.
    pub folded: usize,
    /// Tombstoned ids erased from the store, now free for reuse.
    pub purged: Vec<TaskId>,
}

/// Linear undo/redo history persisted through a [`JournalStorage`].
#[derive(Debug)]
pub struct Journal<S> {
    storage: S,
    base: u64,
    baseline: Vec<BaselineTask>,
    baseline_end: u64,
    entries: Vec<JournalEntry>,
    ends: Vec<u64>,
    cursor: usize,
    tail: u64,
    poisoned: bool,
}

impl<S: JournalStorage> Journal<S> {
    /// Recover the journal from `storage` and rebuild the store it describes.
    ///
    /// A final record that is unterminated or unparsable is treated as an
    /// interrupted write: it is dropped and the storage is truncated back to
    /// the last complete record.
    ///
    /// # Errors
    /// Returns [`JournalError::Corruption`] when a record before the tail is
    /// unreadable, when any well-formed record does not follow the history
    /// before it, or when the history does not replay cleanly, and
    /// [`JournalError::Storage`] when the backend fails.
    pub fn open(mut storage: S) -> Result<(Self, KeyedStore), JournalError> {
        let bytes = storage.read_all().map_err(JournalError::storage)?;
        let mut replay = Replay::default();
        let mut offset = 0_u64;
        let mut line_no = 0_usize;
        let mut rest = bytes.as_slice();

        while !rest.is_empty() {
            line_no += 1;
            let (line, consumed, complete) = rest
                .iter()
                .position(|byte| *byte == b'\n')
                .map_or((rest, rest.len(), false), |idx| (&rest[..idx], idx + 1, true));
            rest = &rest[consumed..];
            let end = offset + consumed as u64;

            let parsed = if complete {
                serde_json::from_slice::<JournalRecord>(line).map_err(|err| err.to_string())
            } else {
                Err("record is not newline-terminated".to_owned())
            };

            match parsed {
                Ok(record) => replay
                    .accept(line_no, record, end)
                    .map_err(|reason| JournalError::Corruption { line: line_no, reason })?,
                Err(reason) if rest.is_empty() => {
                    warn!(line = line_no, %reason, kept_bytes = offset, "Discarding incomplete journal record");
                    storage.truncate(offset).map_err(JournalError::storage)?;
                    break;
                }
                Err(reason) => return Err(JournalError::Corruption { line: line_no, reason }),
            }
            offset = end;
        }

        let journal = Self {
            storage,
            base: replay.base,
            baseline: replay.baseline,
            baseline_end: replay.baseline_end,
            entries: replay.entries,
            ends: replay.ends,
            cursor: replay.cursor,
            tail: offset,
            poisoned: false,
        };
        let store = journal.rebuild(&replay.lines)?;
        info!(
            entries = journal.entries.len(),
            cursor = journal.cursor,
            active = store.len_active(),
            tombstones = store.len_tombstones(),
            "Recovered journal"
        );
        Ok((journal, store))
    }

    fn rebuild(&self, lines: &[usize]) -> Result<KeyedStore, JournalError> {
        let corrupt = |idx: usize, err: &JournalError| JournalError::Corruption {
            line: lines.get(idx).copied().unwrap_or_default(),
            reason: err.to_string(),
        };

        let mut store = KeyedStore::new();
        for BaselineTask { id, task } in &self.baseline {
            store.put(*id, task.clone());
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            Self::check_forward(&store, entry)
                .and_then(|()| Self::apply_forward(&mut store, entry))
                .map_err(|err| corrupt(idx, &err))?;
        }
        for idx in (self.cursor..self.entries.len()).rev() {
            Self::apply_backward(&mut store, &self.entries[idx]).map_err(|err| corrupt(idx, &err))?;
        }
        debug!(redoable = self.entries.len() - self.cursor, "Rebuilt store from journal");
        Ok(store)
    }

    /// Number of applied entries in the retained history.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Sequence number of the last applied entry (0 when nothing was ever applied).
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.base + self.cursor as u64
    }

    /// Whether an undo step is available.
    #[must_use]
    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether a redo step is available.
    #[must_use]
    pub const fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Retained entries paired with whether they are currently applied.
    pub fn history(&self) -> impl Iterator<Item = (&JournalEntry, bool)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry, idx < self.cursor))
    }

    /// Ids referenced by any retained entry.
    #[must_use]
    pub fn referenced_ids(&self) -> BTreeSet<TaskId> {
        self.entries.iter().map(|entry| entry.target).collect()
    }

    /// Byte offset right after the entry that ends the first `count` entries.
    fn end_of(&self, count: usize) -> u64 {
        count
            .checked_sub(1)
            .and_then(|idx| self.ends.get(idx).copied())
            .unwrap_or(self.baseline_end)
    }

    /// Durably persist `entry` as the next forward operation.
    ///
    /// Entries past the cursor are cut off first; when that is needed the
    /// file is rewritten atomically so a failure leaves the old history intact.
    /// A plain append that fails is truncated away again.
    ///
    /// # Errors
    /// Returns [`JournalError::Mismatch`] if the sequence number is not the
    /// next one, or a storage/encoding error. On error nothing changed. If
    /// the failed append cannot be removed, every later write returns
    /// [`JournalError::Poisoned`] until the journal is reopened.
    pub fn append(&mut self, entry: JournalEntry) -> Result<(), JournalError> {
        self.ensure_writable()?;
        if entry.sequence != self.position() + 1 {
            return Err(JournalError::Mismatch {
                kind: entry.kind.as_str(),
                target: entry.target,
                reason: "sequence number is not the next position",
            });
        }
        entry.validate()?;
        let line = JournalRecord::Entry(entry.clone()).to_line()?;

        let new_end = if self.can_redo() {
            let cut = self.end_of(self.cursor);
            let keep = usize::try_from(cut).map_err(JournalError::storage)?;
            let mut bytes = self.storage.read_all().map_err(JournalError::storage)?;
            bytes.truncate(keep);
            bytes.extend_from_slice(&line);
            self.storage.replace(&bytes).map_err(JournalError::storage)?;
            debug!(dropped = self.entries.len() - self.cursor, "Discarded redo history");
            bytes.len() as u64
        } else {
            if let Err(err) = self.storage.append(&line) {
                return Err(self.roll_back(err));
            }
            self.tail + line.len() as u64
        };

        self.tail = new_end;
        self.entries.truncate(self.cursor);
        self.ends.truncate(self.cursor);
        self.entries.push(entry);
        self.ends.push(new_end);
        self.cursor += 1;
        Ok(())
    }

    /// Build, persist and apply one forward operation.
    ///
    /// The entry is checked against `store` before anything is written, so a
    /// rejected or failed commit leaves both the journal and the store as they were.
    ///
    /// # Errors
    /// Returns [`JournalError::Store`] when the target does not fit the
    /// operation, [`JournalError::Mismatch`] for malformed payloads, or a
    /// storage error when the write cannot be flushed.
    pub fn commit(
        &mut self,
        store: &mut KeyedStore,
        kind: OpKind,
        target: TaskId,
        before: Option<Task>,
        after: Option<Task>,
        recorded_at: OffsetDateTime,
    ) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::new(self.position() + 1, kind, target, before, after, recorded_at)?;
        Self::check_forward(store, &entry)?;

        let had_redo = self.can_redo();
        self.append(entry.clone())?;
        if had_redo {
            let purged = store.purge_tombstones(&self.referenced_ids());
            if !purged.is_empty() {
                debug!(?purged, "Released ids held only by discarded redo history");
            }
        }
        Self::apply_forward(store, &entry)?;
        info!(sequence = entry.sequence, kind = %entry.kind, target = %entry.target, "Committed journal entry");
        Ok(entry)
    }

    /// Step back one entry.
    ///
    /// # Errors
    /// Returns [`JournalError::NothingToUndo`] at the start of history, or a
    /// storage error if the cursor move cannot be persisted.
    pub fn undo(&mut self, store: &mut KeyedStore) -> Result<JournalEntry, JournalError> {
        if !self.can_undo() {
            return Err(JournalError::NothingToUndo);
        }
        let entry = self.entries[self.cursor - 1].clone();
        self.persist_cursor(self.position() - 1)?;
        self.cursor -= 1;
        Self::apply_backward(store, &entry)?;
        info!(sequence = entry.sequence, kind = %entry.kind, target = %entry.target, "Undid journal entry");
        Ok(entry)
    }

    /// Step forward one entry.
    ///
    /// # Errors
    /// Returns [`JournalError::NothingToRedo`] at the end of history, or a
    /// storage error if the cursor move cannot be persisted.
    pub fn redo(&mut self, store: &mut KeyedStore) -> Result<JournalEntry, JournalError> {
        if !self.can_redo() {
            return Err(JournalError::NothingToRedo);
        }
        let entry = self.entries[self.cursor].clone();
        self.persist_cursor(self.position() + 1)?;
        self.cursor += 1;
        Self::apply_forward(store, &entry)?;
        info!(sequence = entry.sequence, kind = %entry.kind, target = %entry.target, "Redid journal entry");
        Ok(entry)
    }

    fn persist_cursor(&mut self, position: u64) -> Result<(), JournalError> {
        self.ensure_writable()?;
        let line = JournalRecord::Cursor { position }.to_line()?;
        if let Err(err) = self.storage.append(&line) {
            return Err(self.roll_back(err));
        }
        self.tail += line.len() as u64;
        Ok(())
    }

    /// Cut the storage back to the last acknowledged record after a failed
    /// append. When that fails too, every later write is refused.
    fn roll_back(&mut self, err: S::Error) -> JournalError {
        let err = JournalError::storage(err);
        let untouched = self
            .storage
            .read_all()
            .is_ok_and(|bytes| bytes.len() as u64 == self.tail);
        if !untouched && let Err(rollback) = self.storage.truncate(self.tail) {
            let rollback: anyhow::Error = rollback.into();
            error!(%err, reason = %rollback, tail = self.tail, "Could not roll back failed journal write");
            self.poisoned = true;
        }
        err
    }

    const fn ensure_writable(&self) -> Result<(), JournalError> {
        if self.poisoned {
            Err(JournalError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Fold every entry older than `retain` undo steps into the baseline.
    ///
    /// Tombstones no longer referenced by a retained entry are erased from
    /// `store`, which makes their ids available again. Must only run between
    /// commands.
    ///
    /// # Errors
    /// Returns a storage error if the rewritten journal cannot be persisted;
    /// the journal and the store are then unchanged.
    pub fn compact(&mut self, store: &mut KeyedStore, retain: usize) -> Result<CompactionReport, JournalError> {
        self.ensure_writable()?;
        let fold = self.cursor.saturating_sub(retain);
        if fold == 0 {
            return Ok(CompactionReport::default());
        }

        let mut folded_store = KeyedStore::new();
        for BaselineTask { id, task } in &self.baseline {
            folded_store.put(*id, task.clone());
        }
        for entry in &self.entries[..fold] {
            Self::apply_forward(&mut folded_store, entry)?;
        }
        let baseline: Vec<BaselineTask> = folded_store
            .active()
            .map(|(id, task)| BaselineTask { id, task: task.clone() })
            .collect();
        let base = self.base + fold as u64;

        let mut bytes = JournalRecord::Baseline {
            sequence: base,
            tasks: baseline.clone(),
        }
        .to_line()?;
        let baseline_end = bytes.len() as u64;
        let mut ends = Vec::with_capacity(self.entries.len() - fold);
        for entry in &self.entries[fold..] {
            bytes.extend_from_slice(&JournalRecord::Entry(entry.clone()).to_line()?);
            ends.push(bytes.len() as u64);
        }
        let cursor = self.cursor - fold;
        if cursor < ends.len() {
            bytes.extend_from_slice(
                &JournalRecord::Cursor {
                    position: base + cursor as u64,
                }
                .to_line()?,
            );
        }
        self.storage.replace(&bytes).map_err(JournalError::storage)?;

        self.entries.drain(..fold);
        self.base = base;
        self.baseline = baseline;
        self.baseline_end = baseline_end;
        self.ends = ends;
        self.cursor = cursor;
        self.tail = bytes.len() as u64;

        let purged = store.purge_tombstones(&self.referenced_ids());
        info!(folded = fold, purged = purged.len(), base, "Compacted journal");
        Ok(CompactionReport { folded: fold, purged })
    }

    /// Check that `entry` can be applied on top of `store`.
    ///
    /// # Errors
    /// Returns [`JournalError::Store`] when the target is missing, or
    /// [`JournalError::Mismatch`] when a create targets an id already in use.
    pub fn check_forward(store: &KeyedStore, entry: &JournalEntry) -> Result<(), JournalError> {
        match entry.kind {
            OpKind::Create if store.contains(entry.target) => Err(JournalError::Mismatch {
                kind: entry.kind.as_str(),
                target: entry.target,
                reason: "target id is already in use",
            }),
            OpKind::Create => Ok(()),
            OpKind::Update | OpKind::Mark | OpKind::Delete => {
                store.get(entry.target)?;
                Ok(())
            }
        }
    }

    /// Replay the `after` side of `entry`; re-applying is a no-op.
    ///
    /// # Errors
    /// Returns [`JournalError::Store`] when a delete targets a missing id, or
    /// [`JournalError::Mismatch`] when the payload is incomplete.
    pub fn apply_forward(store: &mut KeyedStore, entry: &JournalEntry) -> Result<(), JournalError> {
        match entry.kind {
            OpKind::Create | OpKind::Update | OpKind::Mark => {
                store.put(entry.target, snapshot(entry, entry.after.as_ref(), "missing after snapshot")?);
            }
            OpKind::Delete => {
                if !store.is_tombstone(entry.target) {
                    store.soft_delete(entry.target)?;
                }
            }
        }
        Ok(())
    }

    /// Replay the `before` side of `entry`; re-applying is a no-op.
    ///
    /// # Errors
    /// Returns [`JournalError::Store`] when the target is in neither state
    /// the entry expects, or [`JournalError::Mismatch`] when the payload is incomplete.
    pub fn apply_backward(store: &mut KeyedStore, entry: &JournalEntry) -> Result<(), JournalError> {
        match entry.kind {
            OpKind::Create => {
                if !store.is_tombstone(entry.target) {
                    store.soft_delete(entry.target)?;
                }
            }
            OpKind::Update | OpKind::Mark => {
                store.put(entry.target, snapshot(entry, entry.before.as_ref(), "missing before snapshot")?);
            }
            OpKind::Delete => {
                let before = snapshot(entry, entry.before.as_ref(), "missing before snapshot")?;
                if store.is_active(entry.target) {
                    store.put(entry.target, before);
                } else {
                    store.restore(entry.target, before)?;
                }
            }
        }
        Ok(())
    }
}

fn snapshot(entry: &JournalEntry, task: Option<&Task>, reason: &'static str) -> Result<Task, JournalError> {
    task.cloned().ok_or(JournalError::Mismatch {
        kind: entry.kind.as_str(),
        target: entry.target,
        reason,
    })
}

#[derive(Debug, Default)]
struct Replay {
    base: u64,
    baseline: Vec<BaselineTask>,
    baseline_end: u64,
    entries: Vec<JournalEntry>,
    lines: Vec<usize>,
    ends: Vec<u64>,
    cursor: usize,
}

impl Replay {
    /// Fold one record into the replay state; nothing changes on error.
    fn accept(&mut self, line_no: usize, record: JournalRecord, end: u64) -> Result<(), String> {
        match record {
            JournalRecord::Baseline { sequence, tasks } => {
                if line_no != 1 {
                    return Err("baseline record must be the first line".to_owned());
                }
                self.base = sequence;
                self.baseline = tasks;
                self.baseline_end = end;
            }
            JournalRecord::Entry(entry) => {
                let expected = self.base + self.cursor as u64 + 1;
                if entry.sequence != expected {
                    return Err(format!(
                        "entry sequence {} does not follow cursor (expected {expected})",
                        entry.sequence
                    ));
                }
                entry.validate().map_err(|err| err.to_string())?;
                self.entries.truncate(self.cursor);
                self.lines.truncate(self.cursor);
                self.ends.truncate(self.cursor);
                self.entries.push(entry);
                self.lines.push(line_no);
                self.ends.push(end);
                self.cursor += 1;
            }
            JournalRecord::Cursor { position } => {
                let cursor = position
                    .checked_sub(self.base)
                    .and_then(|relative| usize::try_from(relative).ok())
                    .filter(|relative| *relative <= self.entries.len())
                    .ok_or_else(|| format!("cursor {position} lies outside the recorded history"))?;
                self.cursor = cursor;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MemoryStorage;
    use daymark_core::DateInterval;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-08-01 8:00 UTC);

    fn task(description: &str) -> Task {
        Task::new(description, Vec::new(), T0).unwrap_or_else(|err| panic!("{err}"))
    }

    fn open(storage: &MemoryStorage) -> (Journal<MemoryStorage>, KeyedStore) {
        Journal::open(storage.clone()).unwrap_or_else(|err| panic!("journal must open: {err}"))
    }

    fn create(journal: &mut Journal<MemoryStorage>, store: &mut KeyedStore, description: &str) -> TaskId {
        let id = store.allocate_id();
        journal
            .commit(store, OpKind::Create, id, None, Some(task(description)), T0)
            .unwrap_or_else(|err| panic!("commit must succeed: {err}"));
        id
    }

    fn delete(journal: &mut Journal<MemoryStorage>, store: &mut KeyedStore, id: TaskId) {
        let before = store.get(id).cloned().unwrap_or_else(|err| panic!("{err}"));
        journal
            .commit(store, OpKind::Delete, id, Some(before), None, T0)
            .unwrap_or_else(|err| panic!("delete must succeed: {err}"));
    }

    #[test]
    fn undo_and_redo_walk_the_history() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        let empty = store.clone();

        let a = create(&mut journal, &mut store, "a");
        let renamed = store
            .get(a)
            .unwrap_or_else(|err| panic!("{err}"))
            .with_description("renamed", T0)
            .unwrap_or_else(|err| panic!("{err}"));
        journal
            .commit(
                &mut store,
                OpKind::Update,
                a,
                Some(task("a")),
                Some(renamed.clone()),
                T0,
            )
            .unwrap_or_else(|err| panic!("{err}"));
        delete(&mut journal, &mut store, a);
        let after_all = store.clone();

        for _ in 0..3 {
            journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        }
        assert_eq!(store.list_active_ids(), empty.list_active_ids());
        assert!(matches!(journal.undo(&mut store), Err(JournalError::NothingToUndo)));

        for _ in 0..3 {
            journal.redo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        }
        assert_eq!(store, after_all);
        assert!(matches!(journal.redo(&mut store), Err(JournalError::NothingToRedo)));
    }

    #[test]
    fn reopening_restores_store_and_cursor() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        let b = create(&mut journal, &mut store, "b");
        delete(&mut journal, &mut store, b);
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));

        let (mut reopened, mut rebuilt) = open(&storage);
        assert_eq!(rebuilt, store);
        assert_eq!(reopened.cursor(), 1);
        assert!(reopened.can_redo());

        reopened.redo(&mut rebuilt).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(rebuilt.list_active_ids(), vec![TaskId(0), TaskId(1)]);
    }

    #[test]
    fn new_forward_operation_discards_redo_history() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        create(&mut journal, &mut store, "b");
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));

        let c = create(&mut journal, &mut store, "c");
        assert_eq!(c, TaskId(2));
        assert!(!journal.can_redo());
        assert_eq!(journal.history().count(), 2);

        let (reopened, rebuilt) = open(&storage);
        assert_eq!(reopened.history().count(), 2);
        assert_eq!(rebuilt.list_active_ids(), store.list_active_ids());
        assert_eq!(rebuilt.get(TaskId(2)).map(Task::description), Ok("c"));
    }

    #[test]
    fn failed_flush_changes_nothing() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        let before_bytes = storage.contents();
        let before_store = store.clone();

        storage.fail_writes(true);
        let id = store.allocate_id();
        let result = journal.commit(&mut store, OpKind::Create, id, None, Some(task("b")), T0);
        assert!(matches!(result, Err(JournalError::Storage(_))));
        assert!(matches!(journal.undo(&mut store), Err(JournalError::Storage(_))));
        assert_eq!(store, before_store);
        assert_eq!(journal.cursor(), 1);
        assert_eq!(storage.contents(), before_bytes);

        storage.fail_writes(false);
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        assert!(store.list_active_ids().is_empty());
    }

    #[test]
    fn write_that_lands_before_failing_is_rolled_back() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        let before_bytes = storage.contents();
        let before_store = store.clone();

        storage.fail_after_next_append();
        let id = store.allocate_id();
        let result = journal.commit(&mut store, OpKind::Create, id, None, Some(task("failed")), T0);
        assert!(matches!(result, Err(JournalError::Storage(_))));
        assert_eq!(storage.contents(), before_bytes);
        assert_eq!(store, before_store);

        let acked = create(&mut journal, &mut store, "acked");
        assert_eq!(acked, TaskId(1));

        storage.fail_after_next_append();
        assert!(matches!(journal.undo(&mut store), Err(JournalError::Storage(_))));
        assert_eq!(journal.cursor(), 2);
        let later = create(&mut journal, &mut store, "later");

        let (reopened, rebuilt) = open(&storage);
        assert_eq!(rebuilt, store);
        assert_eq!(reopened.cursor(), 3);
        assert_eq!(rebuilt.get(acked).map(Task::description), Ok("acked"));
        assert_eq!(rebuilt.get(later).map(Task::description), Ok("later"));
    }

    #[test]
    fn failed_rollback_refuses_further_writes() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");

        storage.fail_after_next_append();
        storage.fail_truncates(true);
        let id = store.allocate_id();
        let result = journal.commit(&mut store, OpKind::Create, id, None, Some(task("unacknowledged")), T0);
        assert!(matches!(result, Err(JournalError::Storage(_))));
        storage.fail_truncates(false);

        let result = journal.commit(&mut store, OpKind::Create, id, None, Some(task("b")), T0);
        assert!(matches!(result, Err(JournalError::Poisoned)));
        assert!(matches!(journal.undo(&mut store), Err(JournalError::Poisoned)));
        assert!(matches!(journal.compact(&mut store, 0), Err(JournalError::Poisoned)));
        assert_eq!(store.list_active_ids(), vec![TaskId(0)]);

        let (reopened, rebuilt) = open(&storage);
        assert_eq!(reopened.cursor(), 2);
        assert_eq!(rebuilt.len_active(), 2);
    }

    #[test]
    fn well_formed_tail_record_out_of_sequence_is_corruption() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        create(&mut journal, &mut store, "b");
        let intact = storage.contents();

        let stray = JournalEntry::new(5, OpKind::Create, TaskId(7), None, Some(task("stray")), T0)
            .unwrap_or_else(|err| panic!("{err}"));
        let mut bytes = intact.clone();
        bytes.extend(JournalRecord::Entry(stray).to_line().unwrap_or_else(|err| panic!("{err}")));
        storage.set_contents(bytes.clone());
        let result = Journal::open(storage.clone());
        assert!(matches!(result, Err(JournalError::Corruption { line: 3, .. })));
        assert_eq!(storage.contents(), bytes);

        let mut bytes = intact;
        bytes.extend(
            JournalRecord::Cursor { position: 9 }
                .to_line()
                .unwrap_or_else(|err| panic!("{err}")),
        );
        storage.set_contents(bytes);
        let result = Journal::open(storage.clone());
        assert!(matches!(result, Err(JournalError::Corruption { line: 3, .. })));
    }

    #[test]
    fn commit_rejects_entries_that_do_not_fit_the_store() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        let result = journal.commit(&mut store, OpKind::Delete, TaskId(9), Some(task("x")), None, T0);
        assert!(matches!(result, Err(JournalError::Store(StoreError::NotFound(TaskId(9))))));
        assert!(storage.contents().is_empty());
        assert!(!journal.can_undo());
    }

    #[test]
    fn torn_tail_is_discarded() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        create(&mut journal, &mut store, "b");

        let mut bytes = storage.contents();
        let complete = bytes.len();
        bytes.extend_from_slice(br#"{"type":"entry","sequence":3,"kind":"cre"#);
        storage.set_contents(bytes);

        let (reopened, rebuilt) = open(&storage);
        assert_eq!(reopened.cursor(), 2);
        assert_eq!(rebuilt.list_active_ids(), vec![TaskId(0), TaskId(1)]);
        assert_eq!(storage.contents().len(), complete);
    }

    #[test]
    fn corruption_before_tail_is_fatal() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        create(&mut journal, &mut store, "a");
        create(&mut journal, &mut store, "b");

        let mut bytes = b"not json\n".to_vec();
        bytes.extend_from_slice(&storage.contents());
        storage.set_contents(bytes);

        let result = Journal::open(storage.clone());
        assert!(matches!(result, Err(JournalError::Corruption { line: 1, .. })));
    }

    #[test]
    fn replay_is_idempotent() {
        let mut store = KeyedStore::new();
        let entry = JournalEntry::new(1, OpKind::Delete, TaskId(0), Some(task("a")), None, T0)
            .unwrap_or_else(|err| panic!("{err}"));
        store.put(TaskId(0), task("a"));

        Journal::<MemoryStorage>::apply_forward(&mut store, &entry).unwrap_or_else(|err| panic!("{err}"));
        let once = store.clone();
        Journal::<MemoryStorage>::apply_forward(&mut store, &entry).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(store, once);

        Journal::<MemoryStorage>::apply_backward(&mut store, &entry).unwrap_or_else(|err| panic!("{err}"));
        let restored = store.clone();
        Journal::<MemoryStorage>::apply_backward(&mut store, &entry).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(store, restored);
        assert_eq!(store.get(TaskId(0)), Ok(&task("a")));
    }

    #[test]
    fn compaction_folds_old_entries_and_frees_ids() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        let a = create(&mut journal, &mut store, "a");
        create(&mut journal, &mut store, "b");
        delete(&mut journal, &mut store, a);
        let slot = DateInterval::between(datetime!(2024-08-02 9:00 UTC), datetime!(2024-08-02 10:00 UTC))
            .unwrap_or_else(|err| panic!("{err}"));
        let scheduled = Task::new("c", vec![slot], T0).unwrap_or_else(|err| panic!("{err}"));
        journal
            .commit(&mut store, OpKind::Create, TaskId(2), None, Some(scheduled), T0)
            .unwrap_or_else(|err| panic!("{err}"));
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));

        let report = journal
            .compact(&mut store, 0)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(report.folded, 3);
        assert_eq!(report.purged, vec![a]);
        assert_eq!(store.allocate_id(), TaskId(0));
        assert!(!journal.can_undo());
        assert!(journal.can_redo());

        let (mut reopened, mut rebuilt) = open(&storage);
        assert_eq!(rebuilt, store);
        assert_eq!(reopened.position(), 3);
        reopened.redo(&mut rebuilt).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(rebuilt.list_active_ids(), vec![TaskId(1), TaskId(2)]);
    }

    #[test]
    fn compaction_keeps_the_requested_undo_depth() {
        let storage = MemoryStorage::new();
        let (mut journal, mut store) = open(&storage);
        for name in ["a", "b", "c", "d"] {
            create(&mut journal, &mut store, name);
        }
        let report = journal
            .compact(&mut store, 2)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(report.folded, 2);
        assert_eq!(journal.cursor(), 2);

        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        journal.undo(&mut store).unwrap_or_else(|err| panic!("{err}"));
        assert!(matches!(journal.undo(&mut store), Err(JournalError::NothingToUndo)));
        assert_eq!(store.list_active_ids(), vec![TaskId(0), TaskId(1)]);
    }
}
