//! Ready-set computation and conflict-aware batch selection.
//!
//! Everything here operates on in-memory task lists; the dispatcher owns the
//! I/O around it.

use std::collections::{HashMap, HashSet};

use crate::core::types::StatusSummary;
use crate::manifest::{Task, TaskStatus};

pub const BLOCKED_BY_DEPENDENCY: &str = "Blocked by failed dependency";
pub const INTERRUPTED: &str = "Resumed from interrupted running state";
pub const BUDGET_EXHAUSTED: &str = "Retry budget exhausted";

/// Skip every pending task that depends on a failed or skipped task.
///
/// Repeats until stable so a failure propagates through whole chains in one
/// call. Returns the ids that were skipped, in manifest order of discovery.
pub fn cascade_failures(tasks: &mut [Task]) -> Vec<String> {
    let mut skipped = Vec::new();
    loop {
        let blocked: HashSet<String> = tasks
            .iter()
            .filter(|t| t.status.blocks_dependents())
            .map(|t| t.id.clone())
            .collect();
        let mut changed = false;
        for task in tasks.iter_mut() {
            if task.status == TaskStatus::Pending
                && task.depends_on.iter().any(|dep| blocked.contains(dep))
            {
                task.status = TaskStatus::Skipped;
                task.last_error = Some(BLOCKED_BY_DEPENDENCY.to_string());
                skipped.push(task.id.clone());
                changed = true;
            }
        }
        if !changed {
            return skipped;
        }
    }
}

/// Pending tasks whose dependencies have all passed, in manifest order.
pub fn ready_tasks(tasks: &[Task]) -> Vec<&Task> {
    let status: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| {
            t.depends_on
                .iter()
                .all(|dep| status.get(dep.as_str()) == Some(&TaskStatus::Passed))
        })
        .collect()
}

/// Greedily pick up to `parallel` ready tasks whose `touches` do not overlap.
///
/// When every ready task collides with an earlier admission the batch would be
/// empty, so the first ready task is admitted alone to keep the run moving.
pub fn select_batch(ready: &[&Task], parallel: usize) -> Vec<String> {
    let limit = parallel.max(1);
    let mut selected = Vec::new();
    let mut locked: HashSet<&str> = HashSet::new();

    for task in ready {
        if selected.len() >= limit {
            break;
        }
        if task.touches_any(&locked) {
            continue;
        }
        selected.push(task.id.clone());
        locked.extend(task.touches.iter().map(String::as_str));
    }

    if selected.is_empty()
        && let Some(first) = ready.first()
    {
        selected.push(first.id.clone());
    }
    selected
}

/// Revert tasks stuck in `running` (the process died mid-attempt) to pending.
///
/// The unfinished attempt is handed back, so an interrupted final attempt
/// still gets rerun.
pub fn revert_interrupted(tasks: &mut [Task]) -> Vec<String> {
    let mut reverted = Vec::new();
    for task in tasks.iter_mut() {
        if task.status == TaskStatus::Running {
            task.status = TaskStatus::Pending;
            task.attempts = task.attempts.saturating_sub(1);
            task.last_error = Some(INTERRUPTED.to_string());
            reverted.push(task.id.clone());
        }
    }
    reverted
}

/// Reopen failed tasks that still have attempts left under the retry budget.
pub fn reopen_retryable(tasks: &mut [Task], retry_override: Option<u32>) -> Vec<String> {
    let mut reopened = Vec::new();
    for task in tasks.iter_mut() {
        let limit = retry_override.unwrap_or(task.max_retries);
        if task.status == TaskStatus::Failed && task.attempts <= limit {
            task.status = TaskStatus::Pending;
            reopened.push(task.id.clone());
        }
    }
    reopened
}

/// Fail pending tasks that have no attempts left, so they cannot be selected forever.
pub fn fail_exhausted(tasks: &mut [Task], retry_override: Option<u32>) -> Vec<String> {
    let mut failed = Vec::new();
    for task in tasks.iter_mut() {
        if task.status == TaskStatus::Pending && task.attempts >= task.max_attempts(retry_override)
        {
            task.status = TaskStatus::Failed;
            task.last_error = Some(BUDGET_EXHAUSTED.to_string());
            failed.push(task.id.clone());
        }
    }
    failed
}

pub fn summarize(tasks: &[Task]) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for task in tasks {
        summary.record(task.status);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{task, task_after, touching, with_status};

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn cascade_skips_whole_chain() {
        let mut tasks = vec![
            with_status(task("T001"), TaskStatus::Failed),
            task_after("T002", &["T001"]),
            task_after("T003", &["T002"]),
            task("T004"),
        ];
        let skipped = cascade_failures(&mut tasks);
        assert_eq!(skipped, vec!["T002".to_string(), "T003".to_string()]);
        assert_eq!(tasks[2].status, TaskStatus::Skipped);
        assert_eq!(tasks[2].last_error.as_deref(), Some(BLOCKED_BY_DEPENDENCY));
        assert_eq!(tasks[3].status, TaskStatus::Pending);
    }

    #[test]
    fn ready_requires_all_dependencies_passed() {
        let tasks = vec![
            with_status(task("T001"), TaskStatus::Passed),
            task("T002"),
            task_after("T003", &["T001"]),
            task_after("T004", &["T001", "T002"]),
        ];
        assert_eq!(ids(&ready_tasks(&tasks)), vec!["T002", "T003"]);
    }

    #[test]
    fn batch_excludes_overlapping_touches() {
        let tasks = vec![
            touching(task("T001"), &["a.txt"]),
            touching(task("T002"), &["a.txt", "b.txt"]),
            touching(task("T003"), &["b.txt"]),
            task("T004"),
        ];
        let ready: Vec<&Task> = tasks.iter().collect();
        assert_eq!(select_batch(&ready, 3), vec!["T001", "T003", "T004"]);
    }

    #[test]
    fn batch_respects_parallel_limit() {
        let tasks = vec![task("T001"), task("T002"), task("T003")];
        let ready: Vec<&Task> = tasks.iter().collect();
        assert_eq!(select_batch(&ready, 2), vec!["T001", "T002"]);
        assert_eq!(select_batch(&ready, 0), vec!["T001"]);
    }

    #[test]
    fn tasks_without_touches_never_conflict() {
        let tasks = vec![task("T001"), task("T002")];
        let ready: Vec<&Task> = tasks.iter().collect();
        assert_eq!(select_batch(&ready, 5), vec!["T001", "T002"]);
    }

    #[test]
    fn empty_ready_set_yields_empty_batch() {
        assert!(select_batch(&[], 3).is_empty());
    }

    #[test]
    fn revert_and_reopen_follow_retry_budget() {
        let mut tasks = vec![
            with_status(task("T001"), TaskStatus::Running),
            with_status(task("T002"), TaskStatus::Failed),
            with_status(task("T003"), TaskStatus::Failed),
        ];
        tasks[1].attempts = 1;
        tasks[2].attempts = 2;

        assert_eq!(revert_interrupted(&mut tasks), vec!["T001"]);
        assert_eq!(tasks[0].last_error.as_deref(), Some(INTERRUPTED));
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(tasks[0].attempts, 0);
        assert_eq!(reopen_retryable(&mut tasks, None), vec!["T002"]);
        assert_eq!(tasks[2].status, TaskStatus::Failed);
        assert_eq!(reopen_retryable(&mut tasks, Some(3)), vec!["T003"]);
    }

    #[test]
    fn interrupted_final_attempt_keeps_budget() {
        let mut tasks = vec![with_status(task("T001"), TaskStatus::Running)];
        tasks[0].attempts = 2;

        revert_interrupted(&mut tasks);
        assert_eq!(tasks[0].attempts, 1);
        assert!(fail_exhausted(&mut tasks, None).is_empty());
        assert_eq!(tasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn exhausted_pending_tasks_fail_without_running() {
        let mut tasks = vec![task("T001"), task("T002")];
        tasks[0].attempts = 2;
        tasks[1].attempts = 1;

        assert_eq!(fail_exhausted(&mut tasks, None), vec!["T001"]);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].last_error.as_deref(), Some(BUDGET_EXHAUSTED));
        assert_eq!(tasks[1].status, TaskStatus::Pending);
        assert_eq!(fail_exhausted(&mut tasks, Some(0)), vec!["T002"]);
    }

    #[test]
    fn summarize_counts_each_status() {
        let tasks = vec![
            with_status(task("T001"), TaskStatus::Passed),
            with_status(task("T002"), TaskStatus::Failed),
            with_status(task("T003"), TaskStatus::Skipped),
            task("T004"),
        ];
        let summary = summarize(&tasks);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.pending, 1);
        assert!(!summary.is_success());
    }
}
