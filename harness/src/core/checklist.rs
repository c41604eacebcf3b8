//! Checklist (`TASKS.md`) parsing into manifest tasks.
//!
//! Recognized lines look like:
//!
//! ```text
//! - [ ] T001 Create schema (db/schema.sql)
//! - [x] T002 [P] Write fixtures dependsOn:T001 (tests/fixtures.json, tests/mod.rs)
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::manifest::{DEFAULT_MAX_RETRIES, Task, TaskStatus};

static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[( |x|X)\]\s+(T\d{3})\s*(.*)$").expect("task line"));
static TRAILING_TOUCHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)\s*$").expect("trailing touches"));
static DEPENDS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)dependsOn:([A-Za-z0-9_,-]+)").expect("depends tag"));

const PARALLEL_MARKER: &str = "[P]";

/// Parse every recognized checklist line into a pending (or passed) task.
pub fn parse_checklist(content: &str) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::new();

    for line in content.lines() {
        let Some(caps) = TASK_LINE.captures(line.trim_end()) else {
            continue;
        };
        let done = caps[1].eq_ignore_ascii_case("x");
        let id = caps[2].to_string();
        let tail = &caps[3];

        let parallel = tail.contains(PARALLEL_MARKER);
        let previous = tasks.last().map(|t| t.id.clone());
        let depends_on = parse_depends_on(tail, previous, parallel);
        let touches = parse_touches(tail);
        let title = normalize_title(tail).unwrap_or_else(|| format!("Task {id}"));

        tasks.push(Task {
            run: vec![placeholder_command(&id, &title)],
            id,
            title,
            depends_on,
            touches,
            checks: Vec::new(),
            status: if done {
                TaskStatus::Passed
            } else {
                TaskStatus::Pending
            },
            attempts: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_error: None,
        });
    }

    tasks
}

/// Shell command standing in for real work until the task list is edited.
pub fn placeholder_command(id: &str, title: &str) -> String {
    let escaped = title
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`");
    format!("echo \"[TASK {id}] {escaped}\"")
}

fn parse_touches(tail: &str) -> Vec<String> {
    TRAILING_TOUCHES
        .captures(tail)
        .map(|caps| split_list(&caps[1]))
        .unwrap_or_default()
}

fn parse_depends_on(tail: &str, previous: Option<String>, parallel: bool) -> Vec<String> {
    if let Some(caps) = DEPENDS_TAG.captures(tail) {
        return split_list(&caps[1]);
    }
    if parallel {
        return Vec::new();
    }
    previous.into_iter().collect()
}

fn normalize_title(tail: &str) -> Option<String> {
    let without_marker = tail.replace(PARALLEL_MARKER, "");
    let without_tag = DEPENDS_TAG.replace(&without_marker, "");
    let title = TRAILING_TOUCHES.replace(without_tag.trim(), "");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn sequential_lines_chain_implicitly() {
        let tasks = parse_checklist(
            "# Tasks\n\n- [ ] T001 First (a.txt)\n- [ ] T002 Second (a.txt)\nnotes\n- [X] T003 Third\n",
        );
        assert_eq!(ids(&tasks), vec!["T001", "T002", "T003"]);
        assert!(tasks[0].depends_on.is_empty());
        assert_eq!(tasks[1].depends_on, vec!["T001"]);
        assert_eq!(tasks[2].depends_on, vec!["T002"]);
        assert_eq!(tasks[0].touches, vec!["a.txt"]);
        assert_eq!(tasks[2].status, TaskStatus::Passed);
        assert_eq!(tasks[0].title, "First");
    }

    #[test]
    fn parallel_marker_drops_implicit_dependency() {
        let tasks = parse_checklist("- [ ] T001 First\n- [ ] T002 [P] Second\n");
        assert!(tasks[1].depends_on.is_empty());
        assert_eq!(tasks[1].title, "Second");
    }

    #[test]
    fn explicit_tag_wins_over_parallel_and_chain() {
        let tasks = parse_checklist(
            "- [ ] T001 A\n- [ ] T002 B\n- [ ] T003 [P] C dependsOn:T001, T002 (x.rs, y.rs)\n",
        );
        assert_eq!(tasks[2].depends_on, vec!["T001"]);
        assert_eq!(tasks[2].touches, vec!["x.rs", "y.rs"]);

        let tasks = parse_checklist("- [ ] T001 A\n- [ ] T002 B DEPENDSON:T001,T000\n");
        assert_eq!(tasks[1].depends_on, vec!["T001", "T000"]);
        assert_eq!(tasks[1].title, "B");
    }

    #[test]
    fn empty_title_falls_back_to_task_id() {
        let tasks = parse_checklist("- [ ] T007 [P] (only/paths.rs)\n");
        assert_eq!(tasks[0].title, "Task T007");
        assert_eq!(tasks[0].touches, vec!["only/paths.rs"]);
    }

    #[test]
    fn defaults_are_applied() {
        let tasks = parse_checklist("- [ ] T001 Say \"hi\"\n");
        let task = &tasks[0];
        assert_eq!(task.max_retries, 1);
        assert_eq!(task.attempts, 0);
        assert!(task.checks.is_empty());
        assert_eq!(task.run, vec![r#"echo "[TASK T001] Say \"hi\"""#]);
    }

    #[test]
    fn ignores_unrecognized_lines() {
        let tasks = parse_checklist("- [ ] X001 nope\n* [ ] T001 nope\n- [] T001 nope\n");
        assert!(tasks.is_empty());
    }
}
