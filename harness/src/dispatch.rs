//! Dispatcher: drives a manifest to completion in dependency order.
//!
//! Each loop iteration cascades failures, computes the ready set, selects a
//! conflict-free batch, and runs the batch on scoped threads. Every worker owns
//! `&mut Task` for exactly one manifest entry; the control thread persists the
//! manifest once the batch has joined.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::scheduler::{
    cascade_failures, fail_exhausted, ready_tasks, revert_interrupted, select_batch, summarize,
};
use crate::core::text::{failure_text, truncate_chars};
use crate::core::types::{Checkpoint, Event, EventKind, StatusSummary};
use crate::io::config::HarnessConfig;
use crate::io::manifest_store::{load_change_manifest, write_manifest};
use crate::io::paths::HarnessPaths;
use crate::io::process::{CommandRunner, run_or_fail};
use crate::io::runtime_log::{append_event, write_checkpoint};
use crate::manifest::{ChangeId, Manifest, Task, TaskStatus};

pub const NO_READY_TASKS: &str = "No ready tasks left. Check dependencies and failed tasks.";
const COMMAND_FAILED: &str = "Command failed";
const SUMMARY_LIMIT: usize = 240;
const LAST_ERROR_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Upper bound on tasks per batch (values below 1 act as 1).
    pub parallel: usize,
    /// Overrides every task's `maxRetries` when set.
    pub max_retries: Option<u32>,
    pub command_timeout: Duration,
}

impl DispatchOptions {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            parallel: config.parallel,
            max_retries: None,
            command_timeout: config.command_timeout(),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub change_id: ChangeId,
    pub manifest_path: PathBuf,
    pub summary: StatusSummary,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Task ids of every executed batch, in execution order.
    pub batches: Vec<Vec<String>>,
}

/// Load the manifest of `change_id` and run every pending task.
///
/// Command failures are recorded on the tasks, never returned as errors; `Err`
/// means the manifest or runtime artifacts could not be read or written.
#[instrument(skip_all, fields(change_id = %change_id, parallel = options.parallel))]
pub fn run_dispatch<R: CommandRunner>(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    options: &DispatchOptions,
    runner: &R,
) -> Result<DispatchOutcome> {
    let mut manifest = load_change_manifest(paths, change_id)?;
    let manifest_path = paths.manifest_path(change_id);
    let ctx = TaskContext {
        paths,
        change_id,
        options,
        runner,
    };

    let reverted = revert_interrupted(&mut manifest.tasks);
    if !reverted.is_empty() {
        info!(?reverted, "reverted interrupted tasks to pending");
    }
    let mut dirty = !reverted.is_empty();
    let mut batches = Vec::new();

    let reason = loop {
        let skipped = cascade_failures(&mut manifest.tasks);
        if !skipped.is_empty() {
            info!(?skipped, "skipped tasks blocked by failed dependencies");
            dirty = true;
        }
        let exhausted = fail_exhausted(&mut manifest.tasks, options.max_retries);
        if !exhausted.is_empty() {
            warn!(?exhausted, "failed tasks with no attempts left");
            dirty = true;
            continue;
        }

        if !manifest
            .tasks
            .iter()
            .any(|t| t.status == TaskStatus::Pending)
        {
            break None;
        }

        let ready = ready_tasks(&manifest.tasks);
        if ready.is_empty() {
            warn!("pending tasks remain but none are ready");
            break Some(NO_READY_TASKS.to_string());
        }
        let batch = select_batch(&ready, options.parallel);
        debug!(?batch, ready = ready.len(), "batch selected");

        run_batch(&ctx, &mut manifest.tasks, &batch)?;
        batches.push(batch);

        persist(&manifest_path, &mut manifest)?;
        dirty = false;
    };

    if dirty {
        persist(&manifest_path, &mut manifest)?;
    }

    let summary = summarize(&manifest.tasks);
    let success = summary.is_success();
    info!(
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        pending = summary.pending,
        batches = batches.len(),
        success,
        "dispatch finished"
    );
    Ok(DispatchOutcome {
        change_id: change_id.clone(),
        manifest_path,
        summary,
        success,
        reason,
        batches,
    })
}

fn persist(path: &Path, manifest: &mut Manifest) -> Result<()> {
    manifest.touch();
    write_manifest(path, manifest)
}

/// Shared, read-only inputs for every worker in a batch.
struct TaskContext<'a, R> {
    paths: &'a HarnessPaths,
    change_id: &'a ChangeId,
    options: &'a DispatchOptions,
    runner: &'a R,
}

impl<R: CommandRunner> TaskContext<'_, R> {
    /// Checkpoint first, then the event.
    fn record(
        &self,
        task: &Task,
        session_id: &str,
        summary: String,
        kind: EventKind,
    ) -> Result<()> {
        let timestamp = Utc::now();
        write_checkpoint(
            self.paths,
            &Checkpoint {
                change_id: self.change_id.clone(),
                task_id: task.id.clone(),
                session_id: session_id.to_string(),
                status: task.status,
                summary,
                timestamp,
                attempt: task.attempts,
            },
        )?;
        self.event(task, session_id, kind)
    }

    fn event(&self, task: &Task, session_id: &str, kind: EventKind) -> Result<()> {
        append_event(
            self.paths,
            &Event {
                kind,
                change_id: self.change_id.clone(),
                task_id: task.id.clone(),
                session_id: session_id.to_string(),
                attempt: task.attempts,
                timestamp: Utc::now(),
            },
        )
    }
}

fn run_batch<R: CommandRunner>(
    ctx: &TaskContext<'_, R>,
    tasks: &mut [Task],
    batch: &[String],
) -> Result<()> {
    let results: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = tasks
            .iter_mut()
            .filter(|task| batch.contains(&task.id))
            .map(|task| scope.spawn(move || execute_task(ctx, task)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("task worker panicked")))
            })
            .collect()
    });
    results.into_iter().collect()
}

/// Run one task until it passes or its attempts are used up.
#[instrument(skip_all, fields(task_id = %task.id))]
fn execute_task<R: CommandRunner>(ctx: &TaskContext<'_, R>, task: &mut Task) -> Result<()> {
    let session_id = new_session_id(&task.id);
    let max_attempts = task.max_attempts(ctx.options.max_retries);
    let commands: Vec<String> = task.commands().cloned().collect();

    while task.attempts < max_attempts {
        task.attempts += 1;
        task.status = TaskStatus::Running;
        let attempt = task.attempts;
        ctx.record(
            task,
            &session_id,
            format!("Task started (attempt {attempt}/{max_attempts})"),
            EventKind::TaskStarted,
        )?;

        match run_commands(ctx, task, &session_id, &commands)? {
            None => {
                task.status = TaskStatus::Passed;
                task.last_error = None;
                ctx.record(
                    task,
                    &session_id,
                    format!("Task passed after {attempt} attempt(s)"),
                    EventKind::TaskPassed,
                )?;
                debug!(attempt, "task passed");
                return Ok(());
            }
            Some(error) => {
                task.status = TaskStatus::Failed;
                task.last_error = Some(truncate_chars(&error, LAST_ERROR_LIMIT));
                ctx.record(
                    task,
                    &session_id,
                    format!("Task failed: {}", truncate_chars(&error, SUMMARY_LIMIT)),
                    EventKind::TaskFailed { error },
                )?;
                warn!(attempt, max_attempts, "task attempt failed");
            }
        }
    }
    Ok(())
}

/// Run `run` then `checks`, stopping at the first failure. Returns the failure text, if any.
fn run_commands<R: CommandRunner>(
    ctx: &TaskContext<'_, R>,
    task: &Task,
    session_id: &str,
    commands: &[String],
) -> Result<Option<String>> {
    for command in commands {
        let outcome = run_or_fail(
            ctx.runner,
            command,
            &ctx.paths.root,
            ctx.options.command_timeout,
        );
        ctx.event(
            task,
            session_id,
            EventKind::CommandFinished {
                command: command.clone(),
                code: outcome.code,
                duration_ms: outcome.duration_ms,
                timed_out: outcome.timed_out,
            },
        )?;
        if !outcome.success() {
            return Ok(Some(failure_text(
                &outcome.stderr,
                &outcome.stdout,
                COMMAND_FAILED,
            )));
        }
    }
    Ok(None)
}

/// `<task>-<unix millis>-<6 lowercase alphanumerics>`.
fn new_session_id(task_id: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix = std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase();
    format!("{task_id}-{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_task_scoped_and_unique() {
        let a = new_session_id("T001");
        let b = new_session_id("T001");
        assert!(a.starts_with("T001-"));
        assert_ne!(a, b);
        let suffix = a.rsplit('-').next().expect("suffix");
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }
}
