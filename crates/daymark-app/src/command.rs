//! Command kinds, argument validation and instant parsing.
//!
//! A front end hands over a [`CommandKind`] plus the raw argument tokens;
//! [`Command::validate`] turns them into a typed [`Command`] without ever
//! looking at the store.

use std::fmt;
use std::str::FromStr;

use daymark_core::{Clock, DateInterval, DoneFilter, Task, TaskClass, TaskFilter, TaskId, TextMatcher};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::CommandError;

/// Every command word the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Create a task.
    Add,
    /// Soft-delete a task.
    Delete,
    /// Change description and/or dates.
    Update,
    /// Set or clear the done flag.
    Mark,
    /// Pick one tentative slot.
    Confirm,
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Keyword search.
    Search,
    /// Switch the listing.
    View,
    /// Remote calendar synchronization.
    Sync,
    /// Usage text.
    Help,
    /// Clear the screen.
    Clear,
    /// Leave the shell.
    Exit,
}

impl CommandKind {
    /// All kinds in help order.
    pub const ALL: [Self; 13] = [
        Self::Add,
        Self::Delete,
        Self::Update,
        Self::Mark,
        Self::Confirm,
        Self::Undo,
        Self::Redo,
        Self::Search,
        Self::View,
        Self::Sync,
        Self::Help,
        Self::Clear,
        Self::Exit,
    ];

    /// Canonical command word.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Mark => "mark",
            Self::Confirm => "confirm",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Search => "search",
            Self::View => "view",
            Self::Sync => "sync",
            Self::Help => "help",
            Self::Clear => "clear",
            Self::Exit => "exit",
        }
    }

    /// Argument synopsis.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Self::Add => "add DESCRIPTION... [WHEN...]",
            Self::Delete => "delete ID",
            Self::Update => "update ID [desc=TEXT] [when=WHEN]... [when=none]",
            Self::Mark => "mark ID [done|undone]",
            Self::Confirm => "confirm ID SLOT",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Search => "search KEYWORD...",
            Self::View => "view [all|pending|done|overdue|floating|deadline|schedule|tentative]",
            Self::Sync => "sync",
            Self::Help => "help [COMMAND]",
            Self::Clear => "clear",
            Self::Exit => "exit",
        }
    }

    /// One-line description for help output.
    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Self::Add => "Create a task. WHEN is START/END for a time slot or a single due time.",
            Self::Delete => "Delete a task (undoable).",
            Self::Update => "Change the description or replace the dates of a task.",
            Self::Mark => "Mark a task done, or reopen it with 'undone'.",
            Self::Confirm => "Keep only the given slot (1-based) of a tentative task.",
            Self::Undo => "Revert the most recent change.",
            Self::Redo => "Re-apply the most recently undone change.",
            Self::Search => "List tasks whose description contains every keyword.",
            Self::View => "Switch the task listing (default: pending).",
            Self::Sync => "Synchronize with a remote calendar.",
            Self::Help => "Show this help, or the usage of one command.",
            Self::Clear => "Clear the screen.",
            Self::Exit => "Leave the shell.",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "add" | "new" => Self::Add,
            "delete" | "del" | "rm" => Self::Delete,
            "update" | "edit" => Self::Update,
            "mark" | "done" => Self::Mark,
            "confirm" => Self::Confirm,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            "search" | "find" => Self::Search,
            "view" | "ls" | "list" => Self::View,
            "sync" => Self::Sync,
            "help" | "?" => Self::Help,
            "clear" | "cls" => Self::Clear,
            "exit" | "quit" | "q" => Self::Exit,
            other => {
                return Err(CommandError::invalid(format!(
                    "unknown command '{other}' (try 'help')"
                )));
            }
        };
        Ok(kind)
    }
}

/// Named listings for the `view` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewScope {
    /// Every live task.
    All,
    /// Tasks not marked done.
    #[default]
    Pending,
    /// Tasks marked done.
    Done,
    /// Pending tasks whose dates are all in the past.
    Overdue,
    /// Tasks without dates.
    Floating,
    /// Tasks with a single due time.
    Deadline,
    /// Tasks with one confirmed slot.
    Schedule,
    /// Tasks with several candidate slots.
    Tentative,
}

impl ViewScope {
    /// Label used in view summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Overdue => "overdue",
            Self::Floating => "floating",
            Self::Deadline => "deadline",
            Self::Schedule => "schedule",
            Self::Tentative => "tentative",
        }
    }

    /// Predicate selecting the tasks of this view.
    #[must_use]
    pub fn filter(self) -> TaskFilter {
        let builder = TaskFilter::builder();
        match self {
            Self::All => builder,
            Self::Pending => builder.done(DoneFilter::Pending),
            Self::Done => builder.done(DoneFilter::Done),
            Self::Overdue => builder.overdue(),
            Self::Floating => builder.class(TaskClass::Floating),
            Self::Deadline => builder.class(TaskClass::Deadline),
            Self::Schedule => builder.class(TaskClass::Schedule),
            Self::Tentative => builder.class(TaskClass::Tentative),
        }
        .build()
    }
}

impl FromStr for ViewScope {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scope = match s.trim().to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "pending" | "todo" => Self::Pending,
            "done" => Self::Done,
            "overdue" => Self::Overdue,
            "floating" => Self::Floating,
            "deadline" | "deadlines" => Self::Deadline,
            "schedule" | "schedules" => Self::Schedule,
            "tentative" => Self::Tentative,
            other => return Err(CommandError::invalid(format!("unknown view '{other}'"))),
        };
        Ok(scope)
    }
}

/// A validated command with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create `task` under a freshly allocated id.
    Add {
        /// Fully validated new task.
        task: Task,
    },
    /// Soft-delete `id`.
    Delete {
        /// Target task.
        id: TaskId,
    },
    /// Replace description and/or intervals of `id`.
    Update {
        /// Target task.
        id: TaskId,
        /// New description, if given.
        description: Option<String>,
        /// New intervals, if given (empty turns the task floating).
        intervals: Option<Vec<DateInterval>>,
    },
    /// Set the done flag of `id`.
    Mark {
        /// Target task.
        id: TaskId,
        /// Desired state.
        done: bool,
    },
    /// Keep only slot `slot` (zero-based) of tentative task `id`.
    Confirm {
        /// Target task.
        id: TaskId,
        /// Zero-based slot index.
        slot: usize,
    },
    /// Undo the last applied entry.
    Undo,
    /// Redo the next undone entry.
    Redo,
    /// List tasks matching every keyword.
    Search {
        /// Keyword matcher.
        matcher: TextMatcher,
    },
    /// Switch the current listing.
    View {
        /// Chosen listing.
        scope: ViewScope,
    },
    /// Remote synchronization.
    Sync,
    /// Usage text, optionally for one command.
    Help {
        /// Command to describe.
        topic: Option<CommandKind>,
    },
    /// Clear the presentation buffer.
    Clear,
    /// Leave the shell.
    Exit,
}

impl Command {
    /// Check argument count and shape for `kind`.
    ///
    /// The store is never consulted; `clock` only stamps new tasks.
    ///
    /// # Errors
    /// Returns [`CommandError::InvalidArgument`] for malformed input and
    /// [`CommandError::InvalidShape`] when the dates describe no valid task.
    pub fn validate(kind: CommandKind, args: &[String], clock: &dyn Clock) -> Result<Self, CommandError> {
        match kind {
            CommandKind::Add => validate_add(args, clock.now()),
            CommandKind::Delete => {
                let [id] = exact::<1>(kind, args)?;
                Ok(Self::Delete { id: parse_id(id)? })
            }
            CommandKind::Update => validate_update(args),
            CommandKind::Mark => {
                arity(kind, args, 1, 2)?;
                let id = parse_id(&args[0])?;
                let done = match args.get(1).map(|arg| arg.to_ascii_lowercase()).as_deref() {
                    None | Some("done") => true,
                    Some("undone" | "undo" | "pending") => false,
                    Some(other) => {
                        return Err(CommandError::invalid(format!(
                            "expected 'done' or 'undone', got '{other}'"
                        )));
                    }
                };
                Ok(Self::Mark { id, done })
            }
            CommandKind::Confirm => {
                let [id, slot] = exact::<2>(kind, args)?;
                let id = parse_id(id)?;
                let slot = slot
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|slot| slot.checked_sub(1))
                    .ok_or_else(|| CommandError::invalid(format!("'{slot}' is not a slot number (slots start at 1)")))?;
                Ok(Self::Confirm { id, slot })
            }
            CommandKind::Undo => exact::<0>(kind, args).map(|_| Self::Undo),
            CommandKind::Redo => exact::<0>(kind, args).map(|_| Self::Redo),
            CommandKind::Search => TextMatcher::new(&args.join(" "))
                .map(|matcher| Self::Search { matcher })
                .ok_or_else(|| usage_error(kind)),
            CommandKind::View => {
                arity(kind, args, 0, 1)?;
                let scope = args.first().map_or(Ok(ViewScope::default()), |arg| arg.parse())?;
                Ok(Self::View { scope })
            }
            CommandKind::Sync => exact::<0>(kind, args).map(|_| Self::Sync),
            CommandKind::Help => {
                arity(kind, args, 0, 1)?;
                let topic = args.first().map(|arg| arg.parse()).transpose()?;
                Ok(Self::Help { topic })
            }
            CommandKind::Clear => exact::<0>(kind, args).map(|_| Self::Clear),
            CommandKind::Exit => exact::<0>(kind, args).map(|_| Self::Exit),
        }
    }

    /// Kind this command was validated from.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Add { .. } => CommandKind::Add,
            Self::Delete { .. } => CommandKind::Delete,
            Self::Update { .. } => CommandKind::Update,
            Self::Mark { .. } => CommandKind::Mark,
            Self::Confirm { .. } => CommandKind::Confirm,
            Self::Undo => CommandKind::Undo,
            Self::Redo => CommandKind::Redo,
            Self::Search { .. } => CommandKind::Search,
            Self::View { .. } => CommandKind::View,
            Self::Sync => CommandKind::Sync,
            Self::Help { .. } => CommandKind::Help,
            Self::Clear => CommandKind::Clear,
            Self::Exit => CommandKind::Exit,
        }
    }
}

fn validate_add(args: &[String], now: OffsetDateTime) -> Result<Command, CommandError> {
    let split = args
        .iter()
        .position(|arg| is_when(arg))
        .unwrap_or(args.len());
    let (words, whens) = args.split_at(split);
    let description = words.join(" ");
    if description.trim().is_empty() {
        return Err(usage_error(CommandKind::Add));
    }
    let intervals = whens.iter().map(|raw| parse_when(raw)).collect::<Result<Vec<_>, _>>()?;
    let task = Task::new(description, intervals, now)?;
    Ok(Command::Add { task })
}

fn validate_update(args: &[String]) -> Result<Command, CommandError> {
    let Some((id, changes)) = args.split_first() else {
        return Err(usage_error(CommandKind::Update));
    };
    let id = parse_id(id)?;
    let mut description = None;
    let mut intervals: Option<Vec<DateInterval>> = None;
    let mut cleared = false;

    for change in changes {
        match change.split_once('=') {
            Some(("desc" | "description", text)) => {
                if text.trim().is_empty() {
                    return Err(CommandError::invalid("desc= needs some text"));
                }
                description = Some(text.to_owned());
            }
            Some(("when", "none")) => cleared = true,
            Some(("when", raw)) => intervals.get_or_insert_with(Vec::new).push(parse_when(raw)?),
            _ => {
                return Err(CommandError::invalid(format!(
                    "expected desc=TEXT or when=WHEN, got '{change}'"
                )));
            }
        }
    }

    if cleared {
        if intervals.is_some() {
            return Err(CommandError::invalid("when=none cannot be combined with other dates"));
        }
        intervals = Some(Vec::new());
    }
    if description.is_none() && intervals.is_none() {
        return Err(usage_error(CommandKind::Update));
    }
    Ok(Command::Update {
        id,
        description,
        intervals,
    })
}

/// Parse a date or time given on the command line.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD HH:MM` (read as
/// UTC), or a bare `YYYY-MM-DD` meaning midnight UTC.
///
/// # Errors
/// Returns [`CommandError::InvalidArgument`] when no format matches.
pub fn parse_instant(raw: &str) -> Result<OffsetDateTime, CommandError> {
    let raw = raw.trim();
    if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(instant.to_offset(UtcOffset::UTC));
    }
    let local_formats = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ];
    if let Some(datetime) = local_formats
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, *format).ok())
    {
        return Ok(datetime.assume_utc());
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| CommandError::invalid(format!("'{raw}' is not a date or time (e.g. 2024-08-01T09:00)")))
}

/// Parse `START/END` into a slot or a single instant into a due interval.
///
/// # Errors
/// Returns [`CommandError::InvalidArgument`] for unreadable instants or a
/// slot that ends before it starts.
pub fn parse_when(raw: &str) -> Result<DateInterval, CommandError> {
    match raw.split_once('/') {
        Some((start, end)) => Ok(DateInterval::between(parse_instant(start)?, parse_instant(end)?)?),
        None => parse_instant(raw).map(DateInterval::due),
    }
}

/// Whether `raw` is made only of instants, i.e. it is meant as a date.
fn is_when(raw: &str) -> bool {
    raw.split_once('/').map_or_else(
        || parse_instant(raw).is_ok(),
        |(start, end)| parse_instant(start).is_ok() && parse_instant(end).is_ok(),
    )
}

fn parse_id(raw: &str) -> Result<TaskId, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::invalid(format!("'{raw}' is not a task id")))
}

fn usage_error(kind: CommandKind) -> CommandError {
    CommandError::invalid(format!("usage: {}", kind.usage()))
}

fn arity(kind: CommandKind, args: &[String], min: usize, max: usize) -> Result<(), CommandError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(usage_error(kind))
    }
}

fn exact<const N: usize>(kind: CommandKind, args: &[String]) -> Result<&[String; N], CommandError> {
    args.try_into().map_err(|_| usage_error(kind))
}
