use crate::interval::DateInterval;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

/// Reasons a task value cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Description is empty after trimming.
    #[error("task description must not be blank")]
    BlankDescription,
    /// A single interval without an end.
    #[error("a single interval must have an end")]
    MissingEnd,
    /// Two or more intervals where at least one is not fully bounded.
    #[error("tentative slot {index} must have both a start and an end")]
    UnboundedSlot {
        /// Zero-based index of the offending interval.
        index: usize,
    },
    /// Slot index outside the tentative slots.
    #[error("slot {index} does not exist (task has {available} slots)")]
    NoSuchSlot {
        /// Requested zero-based index.
        index: usize,
        /// Number of slots on the task.
        available: usize,
    },
    /// Confirm requested on something other than a tentative task.
    #[error("only tentative tasks can be confirmed, this one is {0}")]
    NotTentative(TaskClass),
}

/// Classification derived from the shape of a task's intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    /// No date attached.
    Floating,
    /// A single due instant.
    Deadline,
    /// One concrete start/end interval.
    Schedule,
    /// Several candidate schedule slots awaiting confirmation.
    Tentative,
}

impl TaskClass {
    /// Classify a sequence of intervals.
    ///
    /// # Errors
    /// Returns [`ShapeError`] when the intervals match none of the four classes.
    pub fn of(intervals: &[DateInterval]) -> Result<Self, ShapeError> {
        match intervals {
            [] => Ok(Self::Floating),
            [only] => match (only.start(), only.end()) {
                (_, None) => Err(ShapeError::MissingEnd),
                (None, Some(_)) => Ok(Self::Deadline),
                (Some(_), Some(_)) => Ok(Self::Schedule),
            },
            slots => slots
                .iter()
                .position(|slot| !slot.is_bounded())
                .map_or(Ok(Self::Tentative), |index| Err(ShapeError::UnboundedSlot { index })),
        }
    }

    /// Lower-case label used in listings and filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Floating => "floating",
            Self::Deadline => "deadline",
            Self::Schedule => "schedule",
            Self::Tentative => "tentative",
        }
    }

    /// Whether tasks of this class take part in conflict detection.
    #[must_use]
    pub const fn is_schedule_bearing(self) -> bool {
        matches!(self, Self::Schedule | Self::Tentative)
    }
}

impl fmt::Display for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a task.
///
/// # Errors
/// Returns [`ShapeError`] for shapes outside the four classes. Tasks built
/// through [`Task::new`] always classify successfully.
pub fn classify(task: &Task) -> Result<TaskClass, ShapeError> {
    TaskClass::of(&task.intervals)
}

/// Immutable task value.
///
/// Every change produces a new value through one of the `with_*` builders,
/// each of which stamps `last_modified` and re-validates the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTask", into = "RawTask")]
pub struct Task {
    description: String,
    intervals: Vec<DateInterval>,
    done: bool,
    last_modified: OffsetDateTime,
    class: TaskClass,
}

impl Task {
    /// Create a pending task.
    ///
    /// # Errors
    /// Returns [`ShapeError`] when the description is blank or the intervals are malformed.
    pub fn new(
        description: impl Into<String>,
        intervals: Vec<DateInterval>,
        now: OffsetDateTime,
    ) -> Result<Self, ShapeError> {
        Self::assemble(description.into(), intervals, false, now)
    }

    fn assemble(
        description: String,
        intervals: Vec<DateInterval>,
        done: bool,
        last_modified: OffsetDateTime,
    ) -> Result<Self, ShapeError> {
        let description = description.trim().to_owned();
        if description.is_empty() {
            return Err(ShapeError::BlankDescription);
        }
        let class = TaskClass::of(&intervals)?;
        Ok(Self {
            description,
            intervals,
            done,
            last_modified,
            class,
        })
    }

    /// Task text.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Attached intervals in their original order.
    #[must_use]
    pub fn intervals(&self) -> &[DateInterval] {
        &self.intervals
    }

    /// Completion flag.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Timestamp of the last change.
    #[must_use]
    pub const fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }

    /// Derived classification.
    #[must_use]
    pub const fn class(&self) -> TaskClass {
        self.class
    }

    /// Copy with a new description.
    ///
    /// # Errors
    /// Returns [`ShapeError::BlankDescription`] for blank text.
    pub fn with_description(&self, description: impl Into<String>, now: OffsetDateTime) -> Result<Self, ShapeError> {
        Self::assemble(description.into(), self.intervals.clone(), self.done, now)
    }

    /// Copy with replaced intervals.
    ///
    /// # Errors
    /// Returns [`ShapeError`] when the new intervals are malformed.
    pub fn with_intervals(&self, intervals: Vec<DateInterval>, now: OffsetDateTime) -> Result<Self, ShapeError> {
        Self::assemble(self.description.clone(), intervals, self.done, now)
    }

    /// Copy with a new completion flag.
    #[must_use]
    pub fn with_done(&self, done: bool, now: OffsetDateTime) -> Self {
        Self {
            done,
            last_modified: now,
            ..self.clone()
        }
    }

    /// Keep only the chosen tentative slot, turning the task into a schedule.
    ///
    /// # Errors
    /// Returns [`ShapeError::NotTentative`] for other classes and
    /// [`ShapeError::NoSuchSlot`] for an out-of-range index.
    pub fn confirm_slot(&self, index: usize, now: OffsetDateTime) -> Result<Self, ShapeError> {
        if self.class != TaskClass::Tentative {
            return Err(ShapeError::NotTentative(self.class));
        }
        let slot = *self.intervals.get(index).ok_or(ShapeError::NoSuchSlot {
            index,
            available: self.intervals.len(),
        })?;
        self.with_intervals(vec![slot], now)
    }

    /// Latest concrete instant across every interval.
    #[must_use]
    pub fn latest_end(&self) -> Option<OffsetDateTime> {
        self.intervals.iter().filter_map(DateInterval::latest).max()
    }

    /// Pending task whose every interval ended before `now`.
    #[must_use]
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        !self.done && self.latest_end().is_some_and(|end| end < now)
    }
}

#[derive(Serialize, Deserialize)]
struct RawTask {
    description: String,
    #[serde(default)]
    intervals: Vec<DateInterval>,
    #[serde(default)]
    done: bool,
    #[serde(with = "time::serde::rfc3339")]
    last_modified: OffsetDateTime,
}

impl TryFrom<RawTask> for Task {
    type Error = ShapeError;

    fn try_from(raw: RawTask) -> Result<Self, Self::Error> {
        Self::assemble(raw.description, raw.intervals, raw.done, raw.last_modified)
    }
}

impl From<Task> for RawTask {
    fn from(task: Task) -> Self {
        Self {
            description: task.description,
            intervals: task.intervals,
            done: task.done,
            last_modified: task.last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-08-01 8:00 UTC);

    fn slot(start: OffsetDateTime, end: OffsetDateTime) -> DateInterval {
        DateInterval::between(start, end).unwrap_or_else(|err| panic!("valid slot: {err}"))
    }

    fn open_ended(start: OffsetDateTime) -> DateInterval {
        DateInterval::new(Some(start), None).unwrap_or_else(|err| panic!("valid interval: {err}"))
    }

    #[test]
    fn classification_is_exhaustive() {
        let due = DateInterval::due(datetime!(2024-08-02 17:00 UTC));
        let morning = slot(datetime!(2024-08-01 9:00 UTC), datetime!(2024-08-01 10:00 UTC));
        let evening = slot(datetime!(2024-08-01 18:00 UTC), datetime!(2024-08-01 19:00 UTC));

        assert_eq!(TaskClass::of(&[]), Ok(TaskClass::Floating));
        assert_eq!(TaskClass::of(&[due]), Ok(TaskClass::Deadline));
        assert_eq!(TaskClass::of(&[morning]), Ok(TaskClass::Schedule));
        assert_eq!(TaskClass::of(&[morning, evening]), Ok(TaskClass::Tentative));

        assert_eq!(TaskClass::of(&[morning, due]), Err(ShapeError::UnboundedSlot { index: 1 }));
        assert_eq!(
            TaskClass::of(&[open_ended(datetime!(2024-08-01 9:00 UTC))]),
            Err(ShapeError::MissingEnd)
        );
    }

    #[test]
    fn classify_matches_constructed_class() {
        let task = Task::new("Write report", vec![DateInterval::due(NOW)], NOW)
            .unwrap_or_else(|err| panic!("valid task: {err}"));
        assert_eq!(classify(&task), Ok(TaskClass::Deadline));
        assert_eq!(task.class(), TaskClass::Deadline);
    }

    #[test]
    fn blank_descriptions_are_rejected() {
        assert_eq!(Task::new("   ", Vec::new(), NOW), Err(ShapeError::BlankDescription));
    }

    #[test]
    fn builders_produce_new_values() {
        let original = Task::new("Buy milk", Vec::new(), NOW).unwrap_or_else(|err| panic!("{err}"));
        let later = datetime!(2024-08-01 9:00 UTC);
        let done = original.with_done(true, later);

        assert!(!original.is_done());
        assert!(done.is_done());
        assert_eq!(original.last_modified(), NOW);
        assert_eq!(done.last_modified(), later);
    }

    #[test]
    fn confirm_slot_turns_tentative_into_schedule() {
        let first = slot(datetime!(2024-08-01 9:00 UTC), datetime!(2024-08-01 10:00 UTC));
        let second = slot(datetime!(2024-08-02 9:00 UTC), datetime!(2024-08-02 10:00 UTC));
        let tentative = Task::new("Dentist", vec![first, second], NOW).unwrap_or_else(|err| panic!("{err}"));

        let confirmed = tentative
            .confirm_slot(1, NOW)
            .unwrap_or_else(|err| panic!("slot must exist: {err}"));
        assert_eq!(confirmed.class(), TaskClass::Schedule);
        assert_eq!(confirmed.intervals(), &[second]);

        assert_eq!(
            tentative.confirm_slot(2, NOW),
            Err(ShapeError::NoSuchSlot { index: 2, available: 2 })
        );
        assert_eq!(
            confirmed.confirm_slot(0, NOW),
            Err(ShapeError::NotTentative(TaskClass::Schedule))
        );
    }

    #[test]
    fn overdue_requires_pending_and_past_end() {
        let due = Task::new("Submit form", vec![DateInterval::due(datetime!(2024-07-31 12:00 UTC))], NOW)
            .unwrap_or_else(|err| panic!("{err}"));
        assert!(due.is_overdue(NOW));
        assert!(!due.with_done(true, NOW).is_overdue(NOW));

        let floating = Task::new("Someday", Vec::new(), NOW).unwrap_or_else(|err| panic!("{err}"));
        assert!(!floating.is_overdue(NOW));
    }

    #[test]
    fn serde_roundtrip_keeps_timestamp_and_rejects_bad_shapes() {
        let task = Task::new(
            "Project meeting",
            vec![slot(datetime!(2024-08-01 9:00 UTC), datetime!(2024-08-01 10:00 UTC))],
            NOW,
        )
        .unwrap_or_else(|err| panic!("{err}"));
        let json = serde_json::to_string(&task).unwrap_or_else(|err| panic!("{err}"));
        let back: Task = serde_json::from_str(&json).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(back, task);
        assert_eq!(back.last_modified(), NOW);

        let bad = r#"{"description":"x","intervals":[{"start":"2024-08-01T09:00:00Z"}],"last_modified":"2024-08-01T08:00:00Z"}"#;
        assert!(serde_json::from_str::<Task>(bad).is_err());
    }
}
