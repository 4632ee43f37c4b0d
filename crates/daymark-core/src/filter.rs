use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::task::{Task, TaskClass};
use crate::text_matcher::TextMatcher;

/// Completion-state constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DoneFilter {
    /// Accept every task.
    #[default]
    Any,
    /// Only tasks not marked done.
    Pending,
    /// Only tasks marked done.
    Done,
}

/// Predicate used to build filtered views over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    classes: BTreeSet<TaskClass>,
    done: DoneFilter,
    overdue_only: bool,
    text: Option<TextMatcher>,
}

impl TaskFilter {
    /// Start building a filter.
    #[must_use]
    pub fn builder() -> TaskFilterBuilder {
        TaskFilterBuilder::default()
    }

    /// True when the filter accepts everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.done == DoneFilter::Any && !self.overdue_only && self.text.is_none()
    }

    /// Evaluate the filter against a task at instant `now`.
    #[must_use]
    pub fn matches(&self, task: &Task, now: OffsetDateTime) -> bool {
        if !self.classes.is_empty() && !self.classes.contains(&task.class()) {
            return false;
        }
        let done_ok = match self.done {
            DoneFilter::Any => true,
            DoneFilter::Pending => !task.is_done(),
            DoneFilter::Done => task.is_done(),
        };
        if !done_ok {
            return false;
        }
        if self.overdue_only && !task.is_overdue(now) {
            return false;
        }
        self.text.as_ref().is_none_or(|matcher| matcher.matches(task))
    }
}

/// Builder for [`TaskFilter`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl TaskFilterBuilder {
    /// Restrict to the given class (repeatable, logical OR).
    #[must_use]
    pub fn class(mut self, class: TaskClass) -> Self {
        self.filter.classes.insert(class);
        self
    }

    /// Restrict by completion state.
    #[must_use]
    pub fn done(mut self, done: DoneFilter) -> Self {
        self.filter.done = done;
        self
    }

    /// Only keep overdue tasks.
    #[must_use]
    pub fn overdue(mut self) -> Self {
        self.filter.overdue_only = true;
        self
    }

    /// Require every keyword of `query`; blank queries are ignored.
    #[must_use]
    pub fn text(mut self, query: &str) -> Self {
        self.filter.text = TextMatcher::new(query);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> TaskFilter {
        self.filter
    }
}
