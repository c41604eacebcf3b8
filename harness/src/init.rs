//! Scaffolding for a change: requirement + runtime directories and lifecycle state.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::core::types::{HarnessState, LifecycleStatus};
use crate::io::paths::HarnessPaths;
use crate::io::state::{load_state, write_state};
use crate::manifest::{ChangeId, default_goal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOutcome {
    pub change_id: ChangeId,
    pub requirement_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub state_path: PathBuf,
    pub status: LifecycleStatus,
}

/// Initialize (or re-initialize) a change.
///
/// Re-running keeps the previous goal unless a new one is given, and always
/// keeps the original `initializedAt`.
pub fn run_init(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    goal: Option<&str>,
) -> Result<InitOutcome> {
    let requirement_dir = paths.requirement_dir(change_id);
    let runtime_dir = paths.runtime_change_dir(change_id);
    let state_path = paths.state_path(change_id);

    fs::create_dir_all(&requirement_dir)
        .with_context(|| format!("create directory {}", requirement_dir.display()))?;
    fs::create_dir_all(&runtime_dir)
        .with_context(|| format!("create directory {}", runtime_dir.display()))?;

    let previous = load_state(&state_path)?;
    let now = Utc::now();
    let state = HarnessState {
        change_id: change_id.clone(),
        goal: resolve_goal(goal, previous.as_ref(), change_id),
        status: LifecycleStatus::Initialized,
        initialized_at: Some(
            previous
                .as_ref()
                .and_then(|p| p.initialized_at)
                .unwrap_or(now),
        ),
        released_at: None,
        updated_at: now,
    };
    write_state(&state_path, &state)?;

    info!(change_id = %change_id, "change initialized");
    Ok(InitOutcome {
        change_id: change_id.clone(),
        requirement_dir,
        runtime_dir,
        state_path,
        status: state.status,
    })
}

/// Explicit goal, else the recorded one, else the default.
pub(crate) fn resolve_goal(
    goal: Option<&str>,
    state: Option<&HarnessState>,
    change_id: &ChangeId,
) -> String {
    goal.map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .or_else(|| state.map(|s| s.goal.clone()).filter(|g| !g.trim().is_empty()))
        .unwrap_or_else(|| default_goal(change_id))
}
