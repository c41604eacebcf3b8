//! Release: the single hard gate. Writes `RELEASE_NOTE.md` only for a passing report card.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::types::{HarnessState, LifecycleStatus, Overall};
use crate::io::manifest_store::load_change_manifest;
use crate::io::paths::HarnessPaths;
use crate::io::report_store::load_report_card;
use crate::io::state::{load_state, write_state};
use crate::io::store::write_text;
use crate::io::templates::{ReleaseNoteInputs, TaskLine, render_release_note};
use crate::manifest::{ChangeId, TaskStatus};

/// Release refused because the report card did not pass.
///
/// Callers downcast to this to map it to its own exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseBlocked {
    pub change_id: ChangeId,
    pub overall: Overall,
    pub blocking_findings: Vec<String>,
}

impl fmt::Display for ReleaseBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "release blocked for {}: report card overall is {} ({} blocking finding(s))",
            self.change_id,
            self.overall.as_str(),
            self.blocking_findings.len()
        )
    }
}

impl std::error::Error for ReleaseBlocked {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub change_id: ChangeId,
    pub release_note_path: PathBuf,
    pub status: LifecycleStatus,
}

#[instrument(skip_all, fields(change_id = %change_id))]
pub fn run_release(paths: &HarnessPaths, change_id: &ChangeId) -> Result<ReleaseOutcome> {
    let report = load_report_card(&paths.report_card_path(change_id))?;
    let manifest = load_change_manifest(paths, change_id)?;

    if report.overall != Overall::Pass {
        warn!(findings = report.blocking_findings.len(), "release blocked");
        return Err(ReleaseBlocked {
            change_id: change_id.clone(),
            overall: report.overall,
            blocking_findings: report.blocking_findings,
        }
        .into());
    }

    let now = Utc::now();
    let passed: Vec<TaskLine> = manifest
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Passed)
        .map(|t| TaskLine {
            id: t.id.clone(),
            title: t.title.clone(),
        })
        .collect();
    let failed_count = manifest
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count();

    let note = render_release_note(&ReleaseNoteInputs {
        change_id: change_id.to_string(),
        released_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        verification: report.overall.as_str().to_uppercase(),
        passed,
        failed_count,
        findings: report.blocking_findings.clone(),
    })?;
    let release_note_path = paths.release_note_path(change_id);
    write_text(&release_note_path, &note)?;

    let state_path = paths.state_path(change_id);
    let previous = load_state(&state_path)?;
    let state = HarnessState {
        change_id: change_id.clone(),
        goal: manifest.goal.clone(),
        status: LifecycleStatus::Released,
        initialized_at: previous.and_then(|p| p.initialized_at),
        released_at: Some(now),
        updated_at: now,
    };
    write_state(&state_path, &state)?;

    info!(path = %release_note_path.display(), "released");
    Ok(ReleaseOutcome {
        change_id: change_id.clone(),
        release_note_path,
        status: state.status,
    })
}
