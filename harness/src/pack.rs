//! Context package (`context-package.md`): goal, repository facts, and next steps.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::init::resolve_goal;
use crate::io::config::load_config;
use crate::io::git::RepoFacts;
use crate::io::paths::HarnessPaths;
use crate::io::state::load_state;
use crate::io::store::write_text;
use crate::io::templates::{ContextPackageInputs, render_context_package};
use crate::manifest::ChangeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackOutcome {
    pub change_id: ChangeId,
    pub output_path: PathBuf,
    pub goal: String,
}

pub fn run_pack(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    goal: Option<&str>,
) -> Result<PackOutcome> {
    let config = load_config(&paths.config_path)?;
    let state = load_state(&paths.state_path(change_id))?;
    let goal = resolve_goal(goal, state.as_ref(), change_id);
    let facts = RepoFacts::collect(&paths.root);

    let rendered = render_context_package(&ContextPackageInputs {
        change_id: change_id.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        goal: goal.clone(),
        branch: facts.branch,
        commit: facts.commit,
        status: facts.status,
        gates: config.gates.keys().cloned().collect(),
        next_commands: next_commands(change_id),
    })?;

    let output_path = paths.context_package_path(change_id);
    write_text(&output_path, &rendered)?;

    info!(change_id = %change_id, path = %output_path.display(), "context package written");
    Ok(PackOutcome {
        change_id: change_id.clone(),
        output_path,
        goal,
    })
}

fn next_commands(change_id: &ChangeId) -> Vec<String> {
    vec![
        format!("harness plan --change-id {change_id}"),
        format!("harness dispatch --change-id {change_id} --parallel 3"),
        format!("harness verify --change-id {change_id} --strict"),
        format!("harness release --change-id {change_id}"),
    ]
}
