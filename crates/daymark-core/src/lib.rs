//! Temporal model for daymark: intervals, tasks and their classification.

/// Time sources.
pub mod clock;
/// View predicates over tasks.
pub mod filter;
/// Identifier types.
pub mod id;
/// Date intervals and the overlap rule.
pub mod interval;
/// Task values and classification.
pub mod task;
/// Keyword search over descriptions.
pub mod text_matcher;

pub use clock::{Clock, FixedClock, SystemClock};
pub use filter::{DoneFilter, TaskFilter, TaskFilterBuilder};
pub use id::TaskId;
pub use interval::{DateInterval, IntervalError, overlaps};
pub use task::{ShapeError, Task, TaskClass, classify};
pub use text_matcher::TextMatcher;
