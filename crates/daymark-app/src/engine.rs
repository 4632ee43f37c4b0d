//! Command execution against the journaled database.
//!
//! Every invocation goes through the same steps: the raw arguments are
//! validated into a [`Command`], schedule-bearing changes are checked for
//! conflicts, at most one entry is committed, and a [`Response`] is built.
//! A rejected command never touches the journal.

use std::path::Path;

use anyhow::Context;
use daymark_core::{
    Clock, DateInterval, ShapeError, SystemClock, Task, TaskClass, TaskFilter, TaskId, TextMatcher,
};
use daymark_store::{CompactionReport, Database, FileStorage, JournalError, JournalStorage, OpKind};
use tracing::{debug, info};

use crate::command::{Command, CommandKind, ViewScope};
use crate::config::{DisplayConfig, ProjectConfig};
use crate::error::CommandError;
use crate::render::{describe_when, render_table};
use crate::response::Response;

/// Single owner of the database for one interactive session.
#[derive(Debug)]
pub struct Engine<S, C = SystemClock> {
    db: Database<S>,
    clock: C,
    display: DisplayConfig,
    history_limit: Option<usize>,
    view: ViewScope,
}

impl Engine<FileStorage, SystemClock> {
    /// Open the data directory: read `config.toml`, recover the journal and
    /// compact it if configured.
    ///
    /// # Errors
    /// Returns an error when the configuration is invalid or the journal
    /// cannot be opened or recovered.
    pub fn open(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = data_dir.as_ref();
        let config = ProjectConfig::from_dir(dir)?;
        let storage = FileStorage::open(config.journal_path(dir))?;
        Self::with_storage(storage, SystemClock, &config)
    }
}

impl<S: JournalStorage, C: Clock> Engine<S, C> {
    /// Build an engine over an arbitrary journal backend and clock.
    ///
    /// # Errors
    /// Returns an error when the journal cannot be recovered or compacted.
    pub fn with_storage(storage: S, clock: C, config: &ProjectConfig) -> anyhow::Result<Self> {
        let db = Database::open(storage).context("failed to recover journal")?;
        let mut engine = Self {
            db,
            clock,
            display: config.display,
            history_limit: config.journal.history_limit,
            view: ViewScope::default(),
        };
        if config.journal.compact_on_open {
            engine.compact().context("failed to compact journal")?;
        }
        Ok(engine)
    }

    /// Underlying database, read-only.
    pub const fn database(&self) -> &Database<S> {
        &self.db
    }

    /// Listing shown after mutations.
    pub const fn current_view(&self) -> ViewScope {
        self.view
    }

    /// Fold history beyond the configured undo depth. No-op without a limit.
    ///
    /// # Errors
    /// Returns a journal error when the rewritten file cannot be persisted.
    pub fn compact(&mut self) -> Result<CompactionReport, JournalError> {
        match self.history_limit {
            Some(limit) => self.db.compact(limit),
            None => Ok(CompactionReport::default()),
        }
    }

    /// Validate and execute one command.
    ///
    /// User-facing failures come back as a rejected [`Response`].
    ///
    /// # Errors
    /// Returns an error only when the journal itself fails.
    pub fn dispatch(&mut self, kind: CommandKind, args: &[String]) -> anyhow::Result<Response> {
        let outcome = Command::validate(kind, args, &self.clock).and_then(|command| self.execute(command));
        match outcome {
            Ok(response) => Ok(response),
            Err(err) if err.is_user_facing() => {
                info!(command = %kind, reason = %err, "Rejected command");
                Ok(Response::rejected(&err))
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!("{kind} failed"))),
        }
    }

    /// Execute a validated command.
    ///
    /// # Errors
    /// Returns [`CommandError`] when the command cannot be applied; the store
    /// and the journal are then unchanged.
    pub fn execute(&mut self, command: Command) -> Result<Response, CommandError> {
        debug!(command = %command.kind(), "Executing command");
        match command {
            Command::Add { task } => self.add(task),
            Command::Delete { id } => self.delete(id),
            Command::Update {
                id,
                description,
                intervals,
            } => self.update(id, description, intervals),
            Command::Mark { id, done } => self.mark(id, done),
            Command::Confirm { id, slot } => self.confirm(id, slot),
            Command::Undo => {
                let entry = self.db.undo()?;
                Ok(self.with_current_view(Response::message(format!("Undid {}.", entry.summary()))))
            }
            Command::Redo => {
                let entry = self.db.redo()?;
                Ok(self.with_current_view(Response::message(format!("Redid {}.", entry.summary()))))
            }
            Command::Search { matcher } => Ok(self.search(&matcher)),
            Command::View { scope } => {
                self.view = scope;
                Ok(self.with_current_view(Response::default()).overwriting())
            }
            Command::Sync => {
                info!("Sync requested without a configured remote");
                Ok(Response::message(
                    "No remote calendar is configured; nothing to synchronize.",
                ))
            }
            Command::Help { topic } => Ok(help(topic)),
            Command::Clear => Ok(Response::default().overwriting()),
            Command::Exit => Ok(Response::message("Bye.").exiting()),
        }
    }

    fn add(&mut self, task: Task) -> Result<Response, CommandError> {
        if task.class() == TaskClass::Schedule {
            self.ensure_free(&task, None)?;
        }
        let id = self.db.allocate_id();
        let message = format!("Added task {id} \"{}\" ({}).", task.description(), task.class());
        self.db
            .commit(OpKind::Create, id, None, Some(task), self.clock.now())?;
        Ok(self.with_current_view(Response::message(message)))
    }

    fn delete(&mut self, id: TaskId) -> Result<Response, CommandError> {
        let before = self.db.store().get(id)?.clone();
        let message = format!("Deleted task {id} \"{}\".", before.description());
        self.db
            .commit(OpKind::Delete, id, Some(before), None, self.clock.now())?;
        Ok(self.with_current_view(Response::message(message)))
    }

    fn update(
        &mut self,
        id: TaskId,
        description: Option<String>,
        intervals: Option<Vec<DateInterval>>,
    ) -> Result<Response, CommandError> {
        let now = self.clock.now();
        let before = self.db.store().get(id)?.clone();
        let mut after = before.clone();
        if let Some(description) = description {
            after = after.with_description(description, now)?;
        }
        if let Some(intervals) = intervals {
            after = after.with_intervals(intervals, now)?;
        }
        if after.class() == TaskClass::Schedule {
            self.ensure_free(&after, Some(id))?;
        }
        let message = format!("Updated task {id} \"{}\" ({}).", after.description(), after.class());
        self.db
            .commit(OpKind::Update, id, Some(before), Some(after), now)?;
        Ok(self.with_current_view(Response::message(message)))
    }

    fn mark(&mut self, id: TaskId, done: bool) -> Result<Response, CommandError> {
        let now = self.clock.now();
        let before = self.db.store().get(id)?.clone();
        if before.is_done() == done {
            let state = if done { "done" } else { "pending" };
            return Ok(Response::message(format!("Task {id} is already {state}.")));
        }
        let after = before.with_done(done, now);
        if !done && after.class() == TaskClass::Schedule {
            self.ensure_free(&after, Some(id))?;
        }
        let message = if done {
            format!("Marked task {id} \"{}\" done.", after.description())
        } else {
            format!("Reopened task {id} \"{}\".", after.description())
        };
        self.db
            .commit(OpKind::Mark, id, Some(before), Some(after), now)?;
        Ok(self.with_current_view(Response::message(message)))
    }

    fn confirm(&mut self, id: TaskId, slot: usize) -> Result<Response, CommandError> {
        let now = self.clock.now();
        let before = self.db.store().get(id)?.clone();
        let after = before.confirm_slot(slot, now).map_err(|err| match err {
            ShapeError::NoSuchSlot { available, .. } => CommandError::invalid(format!(
                "task {id} has no slot {} (it has {available})",
                slot + 1
            )),
            other => CommandError::InvalidShape(other),
        })?;
        self.ensure_free(&after, Some(id))?;
        let message = format!(
            "Confirmed slot {} of task {id}: {}.",
            slot + 1,
            describe_when(&after, self.display.clock)
        );
        self.db
            .commit(OpKind::Update, id, Some(before), Some(after), now)?;
        Ok(self.with_current_view(Response::message(message)))
    }

    fn ensure_free(&self, candidate: &Task, exclude: Option<TaskId>) -> Result<(), CommandError> {
        let ids = self.db.conflicts_with(candidate, exclude);
        if ids.is_empty() {
            Ok(())
        } else {
            debug!(?ids, "Schedule conflict");
            Err(CommandError::Conflict { ids })
        }
    }

    fn search(&self, matcher: &TextMatcher) -> Response {
        let query = matcher.keywords().join(" ");
        let filter = TaskFilter::builder().text(&query).build();
        let (count, body) = self.listing(&filter);
        let summary = format!("{count} {} matching \"{query}\"", plural(count));
        Response::default().with_view(summary, body)
    }

    fn with_current_view(&self, response: Response) -> Response {
        let filter = self.view.filter();
        let (count, body) = self.listing(&filter);
        let summary = if filter.is_empty() {
            format!("{count} {}", plural(count))
        } else {
            format!("{count} {} {}", self.view.as_str(), plural(count))
        };
        response.with_view(summary, body)
    }

    fn listing(&self, filter: &TaskFilter) -> (usize, Option<String>) {
        let now = self.clock.now();
        let store = self.db.store();
        let rows: Vec<(TaskId, &Task)> = store
            .list_active_ids_where(|_, task| filter.matches(task, now))
            .into_iter()
            .filter_map(|id| store.get(id).ok().map(|task| (id, task)))
            .collect();
        (rows.len(), render_table(&rows, &self.display, now))
    }
}

const fn plural(count: usize) -> &'static str {
    if count == 1 { "task" } else { "tasks" }
}

fn help(topic: Option<CommandKind>) -> Response {
    match topic {
        Some(kind) => Response {
            messages: vec![format!("usage: {}", kind.usage()), kind.summary().to_owned()],
            ..Response::default()
        },
        None => Response {
            messages: CommandKind::ALL
                .iter()
                .map(|kind| format!("{:<10}{}", kind.as_str(), kind.summary()))
                .collect(),
            ..Response::default()
        },
    }
}
