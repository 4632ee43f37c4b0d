//! Schedule overlap detection against the live store.

use daymark_core::{Task, TaskId, overlaps};

use crate::store::KeyedStore;

/// Whether `candidate` collides with any live schedule-bearing task other than `exclude`.
///
/// Floating and deadline tasks never conflict, on either side; neither do done tasks.
#[must_use]
pub fn has_conflict(store: &KeyedStore, candidate: &Task, exclude: Option<TaskId>) -> bool {
    conflicting(store, candidate, exclude).next().is_some()
}

/// Ids of every live task `candidate` collides with, ascending.
#[must_use]
pub fn find_conflicts(store: &KeyedStore, candidate: &Task, exclude: Option<TaskId>) -> Vec<TaskId> {
    conflicting(store, candidate, exclude).collect()
}

fn conflicting<'a>(
    store: &'a KeyedStore,
    candidate: &'a Task,
    exclude: Option<TaskId>,
) -> impl Iterator<Item = TaskId> + 'a {
    let participates = occupies_time(candidate);
    store
        .active()
        .filter(move |(id, other)| participates && Some(*id) != exclude && occupies_time(other))
        .filter(move |(_, other)| {
            other
                .intervals()
                .iter()
                .any(|theirs| candidate.intervals().iter().any(|ours| overlaps(ours, theirs)))
        })
        .map(|(id, _)| id)
}

fn occupies_time(task: &Task) -> bool {
    !task.is_done() && task.class().is_schedule_bearing()
}
