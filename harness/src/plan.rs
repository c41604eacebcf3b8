//! Planner: builds the task manifest from `TASKS.md` (or a bootstrap task).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::checklist::{parse_checklist, placeholder_command};
use crate::io::manifest_store::{load_manifest, write_manifest};
use crate::io::paths::HarnessPaths;
use crate::io::store::read_text;
use crate::manifest::{
    ChangeId, DEFAULT_MAX_RETRIES, GENERATED_BY, Manifest, ManifestMetadata, ManifestSource, Task,
    TaskStatus, default_goal,
};

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub goal: Option<String>,
    /// Re-parse the checklist and replace an existing manifest.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    pub change_id: ChangeId,
    pub manifest_path: PathBuf,
    pub task_count: usize,
    pub source: ManifestSource,
}

/// Create (or return the existing) manifest for `change_id`.
///
/// Without `overwrite`, an existing manifest is loaded, validated, and left untouched.
pub fn run_plan(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    options: &PlanOptions,
) -> Result<PlanOutcome> {
    let manifest_path = paths.manifest_path(change_id);

    let manifest = if !options.overwrite && manifest_path.exists() {
        debug!(path = %manifest_path.display(), "manifest exists, keeping it");
        load_manifest(&manifest_path)?
    } else {
        let manifest = build_manifest(paths, change_id, options.goal.as_deref())?;
        write_manifest(&manifest_path, &manifest)
            .with_context(|| format!("write manifest for {change_id}"))?;
        info!(
            change_id = %change_id,
            tasks = manifest.tasks.len(),
            source = ?manifest.metadata.source,
            "manifest planned"
        );
        manifest
    };

    Ok(PlanOutcome {
        change_id: change_id.clone(),
        manifest_path,
        task_count: manifest.tasks.len(),
        source: manifest.metadata.source,
    })
}

fn build_manifest(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    goal: Option<&str>,
) -> Result<Manifest> {
    let checklist = read_text(&paths.checklist_path(change_id))?;
    let parsed = checklist.as_deref().map(parse_checklist).unwrap_or_default();

    let (tasks, source) = if parsed.is_empty() {
        (vec![bootstrap_task(change_id)], ManifestSource::Default)
    } else {
        (parsed, ManifestSource::Checklist)
    };

    let now = Utc::now();
    Ok(Manifest {
        change_id: change_id.clone(),
        goal: goal
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_goal(change_id)),
        created_at: now,
        updated_at: now,
        tasks,
        metadata: ManifestMetadata {
            source,
            generated_by: GENERATED_BY.to_string(),
        },
    })
}

fn bootstrap_task(change_id: &ChangeId) -> Task {
    let id = "T001".to_string();
    let title = format!("Bootstrap {change_id}");
    Task {
        run: vec![placeholder_command(&id, &title)],
        id,
        title,
        depends_on: Vec::new(),
        touches: Vec::new(),
        checks: Vec::new(),
        status: TaskStatus::Pending,
        attempts: 0,
        max_retries: DEFAULT_MAX_RETRIES,
        last_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestWorkspace, change_id};

    #[test]
    fn missing_checklist_yields_bootstrap_task() {
        let ws = TestWorkspace::new();
        let outcome = run_plan(&ws.paths, &change_id(), &PlanOptions::default()).expect("plan");
        assert_eq!(outcome.task_count, 1);
        assert_eq!(outcome.source, ManifestSource::Default);

        let manifest = load_manifest(&outcome.manifest_path).expect("load");
        assert_eq!(manifest.tasks[0].title, "Bootstrap REQ-001");
        assert_eq!(
            manifest.goal,
            "Deliver REQ-001 safely with auditable checkpoints."
        );
        assert_eq!(manifest.metadata.generated_by, "harness:plan");
    }

    #[test]
    fn checklist_without_tasks_falls_back_to_default() {
        let ws = TestWorkspace::new();
        ws.write_checklist("# Tasks\n\nnothing here\n");
        let outcome = run_plan(&ws.paths, &change_id(), &PlanOptions::default()).expect("plan");
        assert_eq!(outcome.source, ManifestSource::Default);
    }

    #[test]
    fn existing_manifest_is_kept_unless_overwrite() {
        let ws = TestWorkspace::new();
        ws.write_checklist("- [ ] T001 One\n");
        let first = run_plan(&ws.paths, &change_id(), &PlanOptions::default()).expect("plan");
        assert_eq!(first.task_count, 1);
        let before = std::fs::read_to_string(&first.manifest_path).expect("read");

        ws.write_checklist("- [ ] T001 One\n- [ ] T002 Two\n");
        let again = run_plan(&ws.paths, &change_id(), &PlanOptions::default()).expect("plan");
        assert_eq!(again.task_count, 1);
        let after = std::fs::read_to_string(&again.manifest_path).expect("read");
        assert_eq!(before, after);

        let replaced = run_plan(
            &ws.paths,
            &change_id(),
            &PlanOptions {
                goal: Some("New goal".to_string()),
                overwrite: true,
            },
        )
        .expect("plan");
        assert_eq!(replaced.task_count, 2);
        assert_eq!(replaced.source, ManifestSource::Checklist);
        let manifest = load_manifest(&replaced.manifest_path).expect("load");
        assert_eq!(manifest.goal, "New goal");
        assert_eq!(manifest.tasks[1].depends_on, vec!["T001"]);
    }

    #[test]
    fn invalid_checklist_graph_is_not_persisted() {
        let ws = TestWorkspace::new();
        ws.write_checklist("- [ ] T001 A dependsOn:T002\n- [ ] T002 B\n");
        let err = run_plan(&ws.paths, &change_id(), &PlanOptions::default()).expect_err("cycle");
        assert!(format!("{err:#}").contains("dependency cycle"));
        assert!(!ws.paths.manifest_path(&change_id()).exists());
    }
}
