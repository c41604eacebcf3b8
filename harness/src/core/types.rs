//! Shared types for runtime audit artifacts and verification results.
//!
//! These define the persisted JSON contracts read by other tooling, so field
//! names and enum spellings must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::{ChangeId, TaskStatus};

/// Latest-known state of one task (`checkpoint.json`), overwritten on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub change_id: ChangeId,
    pub task_id: String,
    pub session_id: String,
    pub status: TaskStatus,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attempt: u32,
}

/// One append-only line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub change_id: ChangeId,
    pub task_id: String,
    pub session_id: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TaskStarted,
    #[serde(rename_all = "camelCase")]
    CommandFinished {
        command: String,
        code: i32,
        duration_ms: u64,
        #[serde(default)]
        timed_out: bool,
    },
    TaskPassed,
    TaskFailed {
        error: String,
    },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::TaskStarted => "task_started",
            EventKind::CommandFinished { .. } => "command_finished",
            EventKind::TaskPassed => "task_passed",
            EventKind::TaskFailed { .. } => "task_failed",
        }
    }
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: usize,
    pub running: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusSummary {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Passed => self.passed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub name: String,
    pub status: GateStatus,
    pub command: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub status: GateStatus,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Pass,
    Fail,
}

impl Overall {
    pub fn as_str(self) -> &'static str {
        match self {
            Overall::Pass => "pass",
            Overall::Fail => "fail",
        }
    }
}

/// Verification verdict for a change (`report-card.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub change_id: ChangeId,
    pub overall: Overall,
    pub quick_gates: Vec<GateResult>,
    pub strict_gates: Vec<GateResult>,
    pub review: ReviewResult,
    pub blocking_findings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Initialized,
    Released,
}

/// Per-change lifecycle marker (`harness-state.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessState {
    pub change_id: ChangeId,
    pub goal: String,
    pub status: LifecycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change() -> ChangeId {
        ChangeId::parse("REQ-1").expect("change id")
    }

    #[test]
    fn command_finished_event_is_flat_json() {
        let event = Event {
            kind: EventKind::CommandFinished {
                command: "true".to_string(),
                code: 0,
                duration_ms: 5,
                timed_out: false,
            },
            change_id: change(),
            task_id: "T001".to_string(),
            session_id: "T001-1-abc".to_string(),
            attempt: 1,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "command_finished");
        assert_eq!(value["durationMs"], 5);
        assert_eq!(value["taskId"], "T001");
        assert_eq!(value["changeId"], "REQ-1");

        let back: Event = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn summary_success_requires_no_failed_or_pending() {
        let mut summary = StatusSummary::default();
        summary.record(TaskStatus::Passed);
        summary.record(TaskStatus::Skipped);
        assert!(summary.is_success());
        summary.record(TaskStatus::Pending);
        assert!(!summary.is_success());
    }
}
