//! Janitor: reclaims stale runtime task directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::io::paths::{CHECKPOINT_FILE, HarnessPaths};
use crate::io::runtime_log::read_checkpoint;
use crate::io::store::list_dirs;
use crate::manifest::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JanitorOutcome {
    pub runtime_root: PathBuf,
    pub removed_task_dirs: usize,
    pub removed_change_dirs: usize,
    pub cutoff_hours: u64,
    pub failed_removals: usize,
}

/// Sweep `<runtime>/<change>/<task>` directories last modified more than
/// `hours` before `now`.
///
/// A task whose checkpoint says `running` is kept whatever its age, and so is
/// one whose checkpoint cannot be parsed. A change directory left with no task
/// directories is removed as well.
#[instrument(skip_all, fields(hours))]
pub fn run_janitor(paths: &HarnessPaths, hours: u64, now: SystemTime) -> Result<JanitorOutcome> {
    let cutoff = now
        .checked_sub(Duration::from_secs(hours.saturating_mul(3600)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut outcome = JanitorOutcome {
        runtime_root: paths.runtime_root.clone(),
        removed_task_dirs: 0,
        removed_change_dirs: 0,
        cutoff_hours: hours,
        failed_removals: 0,
    };

    for change_dir in list_dirs(&paths.runtime_root)? {
        for task_dir in list_dirs(&change_dir)? {
            if !is_stale(&task_dir, cutoff) || is_active(&task_dir) {
                continue;
            }
            if remove(&task_dir) {
                outcome.removed_task_dirs += 1;
            } else {
                outcome.failed_removals += 1;
            }
        }

        if list_dirs(&change_dir)?.is_empty() {
            if remove(&change_dir) {
                outcome.removed_change_dirs += 1;
            } else {
                outcome.failed_removals += 1;
            }
        }
    }

    info!(
        removed_task_dirs = outcome.removed_task_dirs,
        removed_change_dirs = outcome.removed_change_dirs,
        failed_removals = outcome.failed_removals,
        "janitor finished"
    );
    Ok(outcome)
}

fn is_stale(dir: &Path, cutoff: SystemTime) -> bool {
    match fs::metadata(dir).and_then(|m| m.modified()) {
        Ok(modified) => modified < cutoff,
        Err(err) => {
            warn!(dir = %dir.display(), err = %err, "cannot stat task dir, keeping it");
            false
        }
    }
}

fn is_active(task_dir: &Path) -> bool {
    match read_checkpoint(&task_dir.join(CHECKPOINT_FILE)) {
        Ok(Some(checkpoint)) => checkpoint.status == TaskStatus::Running,
        Ok(None) => false,
        Err(err) => {
            warn!(dir = %task_dir.display(), err = %format!("{err:#}"), "unreadable checkpoint, keeping task dir");
            true
        }
    }
}

fn remove(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed");
            true
        }
        Err(err) => {
            warn!(dir = %dir.display(), err = %err, "failed to remove directory");
            false
        }
    }
}
