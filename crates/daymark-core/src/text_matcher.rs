use crate::task::Task;

/// Case-insensitive keyword matcher for task descriptions.
///
/// Every whitespace-separated keyword of the query must appear somewhere in
/// the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatcher {
    needles: Vec<String>,
}

impl TextMatcher {
    /// Normalize a query string into a matcher. Returns `None` for blank inputs.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let needles: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if needles.is_empty() {
            return None;
        }
        Some(Self { needles })
    }

    /// Determine whether the task description contains every keyword.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let haystack = task.description().to_lowercase();
        self.needles.iter().all(|needle| haystack.contains(needle.as_str()))
    }

    /// Normalized keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.needles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn task(description: &str) -> Task {
        Task::new(description, Vec::new(), datetime!(2024-08-01 0:00 UTC))
            .unwrap_or_else(|err| panic!("valid task: {err}"))
    }

    #[test]
    fn matcher_skips_blank_queries() {
        assert!(TextMatcher::new("").is_none());
        assert!(TextMatcher::new("   ").is_none());
        assert!(TextMatcher::new("\n").is_none());
    }

    #[test]
    fn matcher_respects_case_insensitive_search() {
        let snapshot = task("Improve CLI docs");

        let matcher = TextMatcher::new("cli").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(matcher.matches(&snapshot));

        let matcher = TextMatcher::new("DOCS improve").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(matcher.matches(&snapshot));

        let missing = TextMatcher::new("cli api").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(!missing.matches(&snapshot));
    }
}
