use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while constructing a [`DateInterval`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    /// The start lies after the end.
    #[error("interval starts at {start} but ends earlier at {end}")]
    Reversed {
        /// Requested start.
        start: OffsetDateTime,
        /// Requested end.
        end: OffsetDateTime,
    },
}

/// Immutable date range attached to a task.
///
/// A missing start means the interval is a point in time (a due instant);
/// a missing end is only representable so that comparison rules are total,
/// committed tasks always carry a concrete end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval", into = "RawInterval")]
pub struct DateInterval {
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
}

impl DateInterval {
    /// Build an interval, rejecting `start > end`.
    ///
    /// # Errors
    /// Returns [`IntervalError::Reversed`] when both bounds are present and out of order.
    pub fn new(start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Result<Self, IntervalError> {
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(IntervalError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Interval with both bounds present.
    ///
    /// # Errors
    /// Returns [`IntervalError::Reversed`] when `start > end`.
    pub fn between(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, IntervalError> {
        Self::new(Some(start), Some(end))
    }

    /// Point-in-time interval used by deadline tasks.
    #[must_use]
    pub const fn due(end: OffsetDateTime) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Lower bound, if any.
    #[must_use]
    pub const fn start(&self) -> Option<OffsetDateTime> {
        self.start
    }

    /// Upper bound, if any.
    #[must_use]
    pub const fn end(&self) -> Option<OffsetDateTime> {
        self.end
    }

    /// True when both bounds are present.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Latest concrete instant covered by the interval.
    #[must_use]
    pub fn latest(&self) -> Option<OffsetDateTime> {
        self.end.or(self.start)
    }
}

/// Closed-interval intersection test.
///
/// A missing start compares as negative infinity and a missing end as positive
/// infinity. Shared endpoints count as an overlap.
#[must_use]
pub fn overlaps(a: &DateInterval, b: &DateInterval) -> bool {
    let a_starts_before_b_ends = match (a.start, b.end) {
        (Some(start), Some(end)) => start <= end,
        _ => true,
    };
    let b_starts_before_a_ends = match (b.start, a.end) {
        (Some(start), Some(end)) => start <= end,
        _ => true,
    };
    a_starts_before_b_ends && b_starts_before_a_ends
}

#[derive(Serialize, Deserialize)]
struct RawInterval {
    #[serde(default, with = "time::serde::rfc3339::option")]
    start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    end: Option<OffsetDateTime>,
}

impl TryFrom<RawInterval> for DateInterval {
    type Error = IntervalError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl From<DateInterval> for RawInterval {
    fn from(interval: DateInterval) -> Self {
        Self {
            start: interval.start,
            end: interval.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn span(start: OffsetDateTime, end: OffsetDateTime) -> DateInterval {
        DateInterval::between(start, end).unwrap_or_else(|err| panic!("valid interval: {err}"))
    }

    #[test]
    fn rejects_reversed_bounds() {
        let err = DateInterval::between(datetime!(2024-08-02 0:00 UTC), datetime!(2024-08-01 0:00 UTC));
        assert!(matches!(err, Err(IntervalError::Reversed { .. })));
    }

    #[test]
    fn shared_endpoint_counts_as_overlap() {
        let first = span(datetime!(2024-08-01 0:00 UTC), datetime!(2024-08-20 0:00 UTC));
        let second = span(datetime!(2024-08-20 0:00 UTC), datetime!(2024-08-30 0:00 UTC));
        assert!(overlaps(&first, &second));
        assert!(overlaps(&second, &first));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap() {
        let morning = span(datetime!(2024-08-01 9:00 UTC), datetime!(2024-08-01 10:00 UTC));
        let evening = span(datetime!(2024-08-01 18:00 UTC), datetime!(2024-08-01 19:00 UTC));
        assert!(!overlaps(&morning, &evening));
        assert!(!overlaps(&evening, &morning));
    }

    #[test]
    fn nested_intervals_overlap() {
        let outer = span(datetime!(2024-08-01 9:00 UTC), datetime!(2024-08-01 17:00 UTC));
        let inner = span(datetime!(2024-08-01 12:00 UTC), datetime!(2024-08-01 13:00 UTC));
        assert!(overlaps(&outer, &inner));
        assert!(overlaps(&inner, &outer));
    }

    #[test]
    fn missing_start_extends_to_the_past() {
        let due = DateInterval::due(datetime!(2024-08-05 0:00 UTC));
        let earlier = span(datetime!(2024-07-01 0:00 UTC), datetime!(2024-07-02 0:00 UTC));
        let later = span(datetime!(2024-08-06 0:00 UTC), datetime!(2024-08-07 0:00 UTC));
        assert!(overlaps(&due, &earlier));
        assert!(!overlaps(&due, &later));
    }

    #[test]
    fn deserialization_validates_order() {
        let bad = r#"{"start":"2024-08-02T00:00:00Z","end":"2024-08-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<DateInterval>(bad).is_err());

        let good = r#"{"end":"2024-08-01T00:00:00Z"}"#;
        let parsed: DateInterval = serde_json::from_str(good).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(parsed, DateInterval::due(datetime!(2024-08-01 0:00 UTC)));
    }
}
