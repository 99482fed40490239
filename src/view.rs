//! Derivation of the visible list: status filter, text search, then
//! priority/due-date ordering. Nothing here mutates the collection.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{FilterMode, Task};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Missing or unrecognised priorities rank after `low`.
pub const UNRANKED: u8 = 3;

pub fn priority_rank(task: &Task) -> u8 {
    task.priority.map_or(UNRANKED, |p| p.rank())
}

pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn matches_search(task: &Task, term: &str) -> bool {
    term.is_empty() || task.text.to_lowercase().contains(&term.to_lowercase())
}

/// Filtered, searched and sorted view over `tasks`.
///
/// Within one priority rank, tasks with a parseable due date come first in
/// ascending date order; the rest keep their stored relative order.
pub fn visible<'a>(tasks: &'a [Task], filter: FilterMode, search: &str) -> Vec<&'a Task> {
    let mut rows: Vec<&Task> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .filter(|task| matches_search(task, search))
        .collect();

    // Stable sort; the key is a total order so ties keep insertion order.
    rows.sort_by_key(|task| {
        let due = task.due_date.as_deref().and_then(parse_due_date);
        (priority_rank(task), due.is_none(), due)
    });
    rows
}

/// Task at a 1-based position of the unfiltered, sorted view, the numbering
/// the command line prints and accepts. `0` and positions past the end are `None`.
pub fn task_at_position(tasks: &[Task], number: usize) -> Option<&Task> {
    let rows = visible(tasks, FilterMode::All, "");
    number.checked_sub(1).and_then(|i| rows.get(i).copied())
}

/// Inverse of [`task_at_position`].
pub fn position_of(tasks: &[Task], id: Uuid) -> Option<usize> {
    visible(tasks, FilterMode::All, "")
        .iter()
        .position(|t| t.id == id)
        .map(|i| i + 1)
}

/// Incomplete tasks over the whole collection, regardless of filter or search.
pub fn active_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| !task.completed).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn task(text: &str, due: Option<&str>, priority: Option<Priority>, completed: bool) -> Task {
        let mut t = Task::new(text, due.map(str::to_string), priority);
        t.completed = completed;
        t
    }

    fn texts(rows: &[&Task]) -> Vec<String> {
        rows.iter().map(|t| t.text.clone()).collect()
    }

    fn sample() -> Vec<Task> {
        vec![
            task("Write report", Some("2024-05-10"), Some(Priority::Medium), false),
            task("Buy milk", None, Some(Priority::High), true),
            task("call mom", Some("2024-05-01"), Some(Priority::Medium), false),
            task("Legacy", None, None, false),
            task("Water plants", None, Some(Priority::Low), true),
            task("Pay rent", Some("2024-04-01"), Some(Priority::High), false),
        ]
    }

    #[test]
    fn filter_keeps_exact_subsequence() {
        let tasks = sample();
        for mode in FilterMode::ALL {
            let got: Vec<_> = visible(&tasks, mode, "").into_iter().map(|t| t.id).collect();
            let mut expected: Vec<_> = tasks.iter().filter(|t| mode.matches(t)).map(|t| t.id).collect();
            let mut got_sorted = got.clone();
            got_sorted.sort();
            expected.sort();
            assert_eq!(got_sorted, expected, "mode {:?}", mode);
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let tasks = sample();
        assert_eq!(texts(&visible(&tasks, FilterMode::All, "CALL")), vec!["call mom"]);
        assert_eq!(texts(&visible(&tasks, FilterMode::All, "a")).len(), 4);
        assert_eq!(visible(&tasks, FilterMode::All, "").len(), tasks.len());
        assert!(visible(&tasks, FilterMode::Active, "milk").is_empty());
    }

    #[test]
    fn sorts_by_rank_then_due_date() {
        let tasks = sample();
        assert_eq!(
            texts(&visible(&tasks, FilterMode::All, "")),
            vec!["Pay rent", "Buy milk", "call mom", "Write report", "Water plants", "Legacy"]
        );
    }

    #[test]
    fn sorted_pairs_respect_ordering() {
        let tasks = sample();
        let rows = visible(&tasks, FilterMode::All, "");
        for pair in rows.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(priority_rank(a) <= priority_rank(b));
            if priority_rank(a) == priority_rank(b) {
                if let (Some(da), Some(db)) = (&a.due_date, &b.due_date) {
                    assert!(parse_due_date(da) <= parse_due_date(db));
                }
            }
        }
    }

    #[test]
    fn undated_ties_keep_stored_order() {
        let tasks = vec![
            task("first", None, Some(Priority::Low), false),
            task("dated", Some("2030-01-01"), Some(Priority::Low), false),
            task("second", None, Some(Priority::Low), false),
            task("bad date", Some("someday"), Some(Priority::Low), false),
        ];
        assert_eq!(
            texts(&visible(&tasks, FilterMode::All, "")),
            vec!["dated", "first", "second", "bad date"]
        );
    }

    #[test]
    fn sorting_leaves_collection_untouched() {
        let tasks = sample();
        let before = tasks.clone();
        let _ = visible(&tasks, FilterMode::All, "");
        assert_eq!(tasks, before);
    }

    #[test]
    fn positions_follow_sorted_view() {
        let tasks = sample();
        assert!(task_at_position(&tasks, 0).is_none());
        assert!(task_at_position(&tasks, tasks.len() + 1).is_none());

        // Stored first is "Write report"; position 1 is the high-priority, earliest-due task.
        let first = task_at_position(&tasks, 1).unwrap();
        assert_eq!(first.text, "Pay rent");
        assert_eq!(task_at_position(&tasks, tasks.len()).unwrap().text, "Legacy");
        assert_eq!(position_of(&tasks, first.id), Some(1));
        assert_eq!(position_of(&tasks, tasks[0].id), Some(4));
        assert_eq!(position_of(&tasks, Uuid::new_v4()), None);
    }

    #[test]
    fn active_count_ignores_view_state() {
        let tasks = sample();
        assert_eq!(active_count(&tasks), 4);
        assert!(matches_search(&tasks[0], ""));
        assert!(!matches_search(&tasks[0], "zzz"));
    }
}
