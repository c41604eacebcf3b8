//! Test-only helpers: deterministic task/manifest builders, a temp workspace,
//! and a scripted [`CommandRunner`].

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::io::manifest_store::write_manifest;
use crate::io::paths::HarnessPaths;
use crate::io::process::{CommandOutcome, CommandRunner};
use crate::manifest::{
    ChangeId, DEFAULT_MAX_RETRIES, Manifest, ManifestMetadata, Task, TaskStatus, default_goal,
};

pub const CHANGE_ID: &str = "REQ-001";

pub fn change_id() -> ChangeId {
    ChangeId::parse(CHANGE_ID).expect("test change id")
}

/// Pending task whose single command is `run <id>`.
pub fn task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        title: format!("{id} title"),
        depends_on: Vec::new(),
        touches: Vec::new(),
        run: vec![format!("run {id}")],
        checks: Vec::new(),
        status: TaskStatus::Pending,
        attempts: 0,
        max_retries: DEFAULT_MAX_RETRIES,
        last_error: None,
    }
}

pub fn task_after(id: &str, deps: &[&str]) -> Task {
    let mut task = task(id);
    task.depends_on = deps.iter().map(|d| (*d).to_string()).collect();
    task
}

pub fn touching(mut task: Task, touches: &[&str]) -> Task {
    task.touches = touches.iter().map(|t| (*t).to_string()).collect();
    task
}

pub fn with_status(mut task: Task, status: TaskStatus) -> Task {
    task.status = status;
    task
}

/// Manifest for [`CHANGE_ID`] with fixed timestamps.
pub fn manifest(tasks: Vec<Task>) -> Manifest {
    let change_id = change_id();
    let at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed timestamp");
    Manifest {
        goal: default_goal(&change_id),
        change_id,
        created_at: at,
        updated_at: at,
        tasks,
        metadata: ManifestMetadata::default(),
    }
}

/// Isolated repository root with harness paths pointing into it.
pub struct TestWorkspace {
    _dir: TempDir,
    pub paths: HarnessPaths,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(dir.path());
        Self { _dir: dir, paths }
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn write_manifest(&self, tasks: Vec<Task>) -> Manifest {
        let manifest = manifest(tasks);
        write_manifest(&self.paths.manifest_path(&change_id()), &manifest)
            .expect("write manifest");
        manifest
    }

    pub fn write_checklist(&self, contents: &str) {
        let path = self.paths.checklist_path(&change_id());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, contents).expect("write checklist");
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Runner that answers from a script instead of spawning processes.
///
/// Each command maps to a queue of exit codes consumed one per call; once a
/// queue is drained (or for unscripted commands) the command succeeds.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, VecDeque<i32>>>,
    missing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue exit codes for `command`.
    pub fn with_codes(self, command: &str, codes: &[i32]) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .entry(command.to_string())
            .or_default()
            .extend(codes.iter().copied());
        self
    }

    /// Make `command` fail to spawn on every call.
    pub fn with_missing(mut self, command: &str) -> Self {
        self.missing.push(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str, _workdir: &Path, _timeout: Duration) -> Result<CommandOutcome> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(command.to_string());
        if self.missing.iter().any(|m| m == command) {
            return Err(anyhow!("spawn {command}: not found"));
        }
        let code = self
            .script
            .lock()
            .expect("script lock")
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0);
        Ok(CommandOutcome {
            code,
            stdout: format!("{command} stdout"),
            stderr: if code == 0 {
                String::new()
            } else {
                format!("{command} exited {code}")
            },
            duration_ms: 1,
            timed_out: false,
        })
    }
}
