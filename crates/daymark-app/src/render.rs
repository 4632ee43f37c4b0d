//! Plain-text task tables.

use std::borrow::Cow;

use daymark_core::{DateInterval, Task, TaskClass, TaskId};
use time::OffsetDateTime;
use time::macros::format_description;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ClockStyle, DisplayConfig};

const ELLIPSIS: &str = "...";
const ELLIPSIS_GRAPHEMES: usize = 3;

/// Render rows as an aligned table, or `None` when there is nothing to show.
#[must_use]
pub fn render_table(rows: &[(TaskId, &Task)], display: &DisplayConfig, now: OffsetDateTime) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let id_width = rows
        .iter()
        .map(|(id, _)| id.to_string().len())
        .max()
        .unwrap_or_default()
        .max("ID".len());
    let descriptions: Vec<Cow<'_, str>> = rows
        .iter()
        .map(|(_, task)| truncate_with_ellipsis(task.description(), display.description_width))
        .collect();
    let description_width = descriptions
        .iter()
        .map(|text| grapheme_len(text))
        .max()
        .unwrap_or_default()
        .max("Description".len());

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!(
        "{:>id_width$}  {:<7}  {:<9}  {}  When",
        "ID",
        "Status",
        "Class",
        pad("Description", description_width)
    ));
    for ((id, task), description) in rows.iter().zip(&descriptions) {
        let line = format!(
            "{:>id_width$}  {:<7}  {:<9}  {}  {}",
            id.to_string(),
            status(task, now),
            task.class().as_str(),
            pad(description, description_width),
            describe_when(task, display.clock)
        );
        lines.push(line.trim_end().to_owned());
    }
    Some(lines.join("\n"))
}

/// Human description of a task's dates.
#[must_use]
pub fn describe_when(task: &Task, clock: ClockStyle) -> String {
    match task.class() {
        TaskClass::Floating => String::new(),
        TaskClass::Deadline | TaskClass::Schedule => task
            .intervals()
            .first()
            .map(|interval| describe_interval(interval, clock))
            .unwrap_or_default(),
        TaskClass::Tentative => task
            .intervals()
            .iter()
            .enumerate()
            .map(|(idx, interval)| format!("{}) {}", idx + 1, describe_interval(interval, clock)))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn describe_interval(interval: &DateInterval, clock: ClockStyle) -> String {
    match (interval.start(), interval.end()) {
        (None, Some(end)) => format!("due {}", format_instant(end, clock)),
        (Some(start), Some(end)) if start.date() == end.date() => {
            format!("{} - {}", format_instant(start, clock), format_time(end, clock))
        }
        (Some(start), Some(end)) => {
            format!("{} - {}", format_instant(start, clock), format_instant(end, clock))
        }
        (Some(start), None) => format!("from {}", format_instant(start, clock)),
        (None, None) => String::new(),
    }
}

/// Date and time of `instant` in the configured clock style.
#[must_use]
pub fn format_instant(instant: OffsetDateTime, clock: ClockStyle) -> String {
    let date = instant
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default();
    format!("{date} {}", format_time(instant, clock))
}

fn format_time(instant: OffsetDateTime, clock: ClockStyle) -> String {
    let result = match clock {
        ClockStyle::TwentyFourHour => instant.format(format_description!("[hour]:[minute]")),
        ClockStyle::TwelveHour => {
            instant.format(format_description!("[hour repr:12 padding:none]:[minute] [period]"))
        }
    };
    result.unwrap_or_default()
}

fn status(task: &Task, now: OffsetDateTime) -> &'static str {
    if task.is_done() {
        "done"
    } else if task.is_overdue(now) {
        "overdue"
    } else {
        "pending"
    }
}

fn grapheme_len(input: &str) -> usize {
    UnicodeSegmentation::graphemes(input, true).count()
}

fn pad(input: &str, width: usize) -> String {
    let fill = width.saturating_sub(grapheme_len(input));
    format!("{input}{}", " ".repeat(fill))
}

/// Cut `input` to `max_graphemes`, ending with `...` when shortened.
#[must_use]
pub fn truncate_with_ellipsis(input: &str, max_graphemes: usize) -> Cow<'_, str> {
    if max_graphemes == 0 {
        return Cow::Owned(String::new());
    }
    if grapheme_len(input) <= max_graphemes {
        return Cow::Borrowed(input);
    }
    if max_graphemes <= ELLIPSIS_GRAPHEMES {
        return Cow::Owned(UnicodeSegmentation::graphemes(input, true).take(max_graphemes).collect());
    }
    let keep = max_graphemes - ELLIPSIS_GRAPHEMES;
    let mut truncated: String = UnicodeSegmentation::graphemes(input, true).take(keep).collect();
    truncated.push_str(ELLIPSIS);
    Cow::Owned(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-08-10 12:00 UTC);

    fn task(description: &str, intervals: Vec<DateInterval>) -> Task {
        Task::new(description, intervals, NOW).unwrap_or_else(|err| panic!("{err}"))
    }

    fn slot(start: OffsetDateTime, end: OffsetDateTime) -> DateInterval {
        DateInterval::between(start, end).unwrap_or_else(|err| panic!("{err}"))
    }

    #[test]
    fn truncation_respects_grapheme_clusters() {
        assert!(matches!(truncate_with_ellipsis("Short", 20), Cow::Borrowed("Short")));
        assert_eq!(truncate_with_ellipsis("あいうえおかきくけこ", 5), "あい...");
        assert_eq!(truncate_with_ellipsis("a\u{0301}bcdef", 4), "a\u{0301}...");
    }

    #[test]
    fn clock_style_changes_times_only() {
        let meeting = task(
            "Project meeting",
            vec![slot(datetime!(2024-08-01 14:00 UTC), datetime!(2024-08-01 15:30 UTC))],
        );
        assert_eq!(
            describe_when(&meeting, ClockStyle::TwentyFourHour),
            "2024-08-01 14:00 - 15:30"
        );
        assert_eq!(
            describe_when(&meeting, ClockStyle::TwelveHour),
            "2024-08-01 2:00 PM - 3:30 PM"
        );
    }

    #[test]
    fn describes_every_class() {
        let due = task("Report", vec![DateInterval::due(datetime!(2024-08-05 17:00 UTC))]);
        assert_eq!(describe_when(&due, ClockStyle::TwentyFourHour), "due 2024-08-05 17:00");

        let trip = task(
            "Trip",
            vec![slot(datetime!(2024-08-01 0:00 UTC), datetime!(2024-08-20 0:00 UTC))],
        );
        assert_eq!(
            describe_when(&trip, ClockStyle::TwentyFourHour),
            "2024-08-01 00:00 - 2024-08-20 00:00"
        );

        let dentist = task(
            "Dentist",
            vec![
                slot(datetime!(2024-08-12 9:00 UTC), datetime!(2024-08-12 10:00 UTC)),
                slot(datetime!(2024-08-13 9:00 UTC), datetime!(2024-08-13 10:00 UTC)),
            ],
        );
        assert_eq!(
            describe_when(&dentist, ClockStyle::TwentyFourHour),
            "1) 2024-08-12 09:00 - 10:00; 2) 2024-08-13 09:00 - 10:00"
        );
        assert_eq!(describe_when(&task("Someday", Vec::new()), ClockStyle::TwelveHour), "");
    }

    #[test]
    fn table_aligns_columns_and_marks_status() {
        let overdue = task("Report", vec![DateInterval::due(datetime!(2024-08-05 17:00 UTC))]);
        let done = task("Groceries", Vec::new()).with_done(true, NOW);
        let table = render_table(
            &[(TaskId(0), &overdue), (TaskId(12), &done)],
            &DisplayConfig::default(),
            NOW,
        )
        .unwrap_or_else(|| panic!("rows must render"));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID  Status   Class      Description"));
        assert!(lines[1].starts_with(" 0  overdue  deadline   Report"));
        assert!(lines[1].ends_with("due 2024-08-05 17:00"));
        assert!(lines[2].starts_with("12  done     floating   Groceries"));
        assert!(render_table(&[], &DisplayConfig::default(), NOW).is_none());
    }
}
