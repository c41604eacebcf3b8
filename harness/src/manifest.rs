//! Task manifest model (`task-manifest.json`).

use std::fmt;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static CHANGE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(REQ|BUG)-\d+$").expect("change id pattern"));
static TASK_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_-]{1,31}$").expect("task id pattern"));

pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const GENERATED_BY: &str = "harness:plan";

/// Identifier for one unit of work (`REQ-123`, `BUG-7`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangeId(String);

impl ChangeId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !CHANGE_ID_PATTERN.is_match(trimmed) {
            return Err(anyhow!(
                "invalid change id '{raw}' (expected REQ-123 or BUG-123)"
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChangeId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ChangeId> for String {
    fn from(value: ChangeId) -> Self {
        value.0
    }
}

impl std::str::FromStr for ChangeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn is_valid_task_id(id: &str) -> bool {
    TASK_ID_PATTERN.is_match(id)
}

/// Default goal text for a change when none was supplied.
pub fn default_goal(change_id: &ChangeId) -> String {
    format!("Deliver {change_id} safely with auditable checkpoints.")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Passed => "passed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }

    /// Failed and skipped tasks block everything that depends on them.
    pub fn blocks_dependents(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Skipped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Resources this task modifies; only used to keep conflicting tasks out of one batch.
    #[serde(default)]
    pub touches: Vec<String>,
    pub run: Vec<String>,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Task {
    /// Total attempts allowed, honoring an optional caller override of `max_retries`.
    pub fn max_attempts(&self, retry_override: Option<u32>) -> u32 {
        retry_override.unwrap_or(self.max_retries).saturating_add(1)
    }

    /// `run` followed by `checks`, in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &String> {
        self.run.iter().chain(self.checks.iter())
    }

    pub fn touches_any(&self, locked: &std::collections::HashSet<&str>) -> bool {
        self.touches.iter().any(|t| locked.contains(t.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestSource {
    #[serde(rename = "TASKS.md")]
    Checklist,
    #[default]
    #[serde(rename = "default")]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    #[serde(default)]
    pub source: ManifestSource,
    #[serde(default = "default_generated_by")]
    pub generated_by: String,
}

fn default_generated_by() -> String {
    GENERATED_BY.to_string()
}

impl Default for ManifestMetadata {
    fn default() -> Self {
        Self {
            source: ManifestSource::Default,
            generated_by: default_generated_by(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub change_id: ChangeId,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub metadata: ManifestMetadata,
}

impl Manifest {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_id_accepts_req_and_bug() {
        assert_eq!(ChangeId::parse("REQ-001").expect("req").as_str(), "REQ-001");
        assert_eq!(ChangeId::parse(" BUG-42 ").expect("bug").as_str(), "BUG-42");
    }

    #[test]
    fn change_id_rejects_other_shapes() {
        for raw in ["", "REQ", "req-1", "FEAT-1", "REQ-1a", "../REQ-1"] {
            assert!(ChangeId::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn task_id_pattern() {
        assert!(is_valid_task_id("T001"));
        assert!(is_valid_task_id("SETUP_DB-2"));
        assert!(!is_valid_task_id("t001"));
        assert!(!is_valid_task_id("T"));
        assert!(!is_valid_task_id("T 1"));
    }

    #[test]
    fn task_defaults_fill_missing_fields() {
        let task: Task =
            serde_json::from_str(r#"{"id":"T001","title":"x","run":["true"]}"#).expect("parse");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.max_retries, 1);
        assert_eq!(task.attempts, 0);
        assert!(task.depends_on.is_empty());
        assert_eq!(task.max_attempts(None), 2);
        assert_eq!(task.max_attempts(Some(0)), 1);
    }

    #[test]
    fn task_serializes_camel_case_without_empty_error() {
        let task = Task {
            id: "T001".to_string(),
            title: "x".to_string(),
            depends_on: vec![],
            touches: vec![],
            run: vec!["true".to_string()],
            checks: vec![],
            status: TaskStatus::Passed,
            attempts: 1,
            max_retries: 1,
            last_error: None,
        };
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["dependsOn"], serde_json::json!([]));
        assert_eq!(json["maxRetries"], 1);
        assert_eq!(json["status"], "passed");
        assert!(json.get("lastError").is_none());
    }

    #[test]
    fn manifest_source_uses_checklist_file_name() {
        let json = serde_json::to_string(&ManifestSource::Checklist).expect("serialize");
        assert_eq!(json, "\"TASKS.md\"");
    }
}
