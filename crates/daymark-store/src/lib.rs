//! Durable task storage for daymark.
//!
//! [`KeyedStore`] holds the live tasks in memory, [`Journal`] records every
//! mutation as an undoable entry in a JSON-lines file, and [`Database`]
//! combines the two so that no change reaches the store without first being
//! flushed to the journal. The [`conflict`] module answers schedule overlap
//! queries against the live store.

pub mod conflict;
pub mod database;
pub mod entry;
pub mod error;
pub mod journal;
pub mod storage;
pub mod store;

pub use conflict::{find_conflicts, has_conflict};
pub use database::Database;
pub use entry::{BaselineTask, JournalEntry, JournalRecord, OpKind};
pub use error::{JournalError, StoreError};
pub use journal::{CompactionReport, Journal};
pub use storage::{FileStorage, JournalStorage, MemoryStorage};
pub use store::KeyedStore;
