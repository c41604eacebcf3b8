//! Canonical on-disk layout for a harness-managed repository.

use std::path::{Path, PathBuf};

use crate::manifest::ChangeId;

/// All canonical paths for a repository root.
///
/// Stateless: every operation receives one of these instead of resolving
/// locations on its own, so tests can point a whole run at a temp directory.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    pub root: PathBuf,
    pub harness_dir: PathBuf,
    pub config_path: PathBuf,
    pub runtime_root: PathBuf,
    pub requirements_dir: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let harness_dir = root.join(".harness");
        Self {
            config_path: harness_dir.join("config.toml"),
            runtime_root: harness_dir.join("runtime"),
            requirements_dir: root.join("devflow").join("requirements"),
            harness_dir,
            root,
        }
    }

    pub fn requirement_dir(&self, change_id: &ChangeId) -> PathBuf {
        self.requirements_dir.join(change_id.as_str())
    }

    pub fn manifest_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("task-manifest.json")
    }

    pub fn checklist_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("TASKS.md")
    }

    pub fn report_card_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("report-card.json")
    }

    pub fn release_note_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("RELEASE_NOTE.md")
    }

    pub fn state_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("harness-state.json")
    }

    pub fn context_package_path(&self, change_id: &ChangeId) -> PathBuf {
        self.requirement_dir(change_id).join("context-package.md")
    }

    pub fn runtime_change_dir(&self, change_id: &ChangeId) -> PathBuf {
        self.runtime_root.join(change_id.as_str())
    }

    pub fn runtime_task_dir(&self, change_id: &ChangeId, task_id: &str) -> PathBuf {
        self.runtime_change_dir(change_id).join(task_id)
    }

    pub fn checkpoint_path(&self, change_id: &ChangeId, task_id: &str) -> PathBuf {
        self.runtime_task_dir(change_id, task_id).join(CHECKPOINT_FILE)
    }

    pub fn events_path(&self, change_id: &ChangeId, task_id: &str) -> PathBuf {
        self.runtime_task_dir(change_id, task_id).join("events.jsonl")
    }
}

pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Walk up from `start` to the nearest directory that looks like a harness
/// repository (`.harness/`, `devflow/` or `.git`). Falls back to `start`.
pub fn resolve_repo_root(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        if [".harness", "devflow", ".git"]
            .iter()
            .any(|marker| dir.join(marker).exists())
        {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        let change = ChangeId::parse("REQ-7").expect("change id");

        assert!(
            paths
                .manifest_path(&change)
                .ends_with("devflow/requirements/REQ-7/task-manifest.json")
        );
        assert!(
            paths
                .checkpoint_path(&change, "T001")
                .ends_with(".harness/runtime/REQ-7/T001/checkpoint.json")
        );
        assert!(
            paths
                .events_path(&change, "T001")
                .ends_with(".harness/runtime/REQ-7/T001/events.jsonl")
        );
        assert!(paths.config_path.ends_with(".harness/config.toml"));
    }

    #[test]
    fn resolve_root_walks_up_to_marker() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("devflow")).expect("mkdir");
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).expect("mkdir nested");

        assert_eq!(resolve_repo_root(&nested), temp.path());
    }
}
