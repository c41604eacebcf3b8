//! Resume: repair a manifest left behind by an interrupted or failed run, then dispatch.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::scheduler::{reopen_retryable, revert_interrupted};
use crate::dispatch::{DispatchOptions, DispatchOutcome, run_dispatch};
use crate::io::manifest_store::{load_change_manifest, write_manifest};
use crate::io::paths::HarnessPaths;
use crate::io::process::CommandRunner;
use crate::manifest::ChangeId;

/// Revert `running` tasks, reopen failed tasks that still have budget, persist, dispatch.
///
/// Tasks already `skipped` stay skipped even when the failure that blocked them
/// is reopened and passes, so `success` can be reported while they never ran.
/// Replan with `harness plan --overwrite` to run them.
#[instrument(skip_all, fields(change_id = %change_id))]
pub fn run_resume<R: CommandRunner>(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    options: &DispatchOptions,
    runner: &R,
) -> Result<DispatchOutcome> {
    let mut manifest = load_change_manifest(paths, change_id)?;

    let reverted = revert_interrupted(&mut manifest.tasks);
    let reopened = reopen_retryable(&mut manifest.tasks, options.max_retries);
    info!(?reverted, ?reopened, "manifest repaired for resume");

    manifest.touch();
    write_manifest(&paths.manifest_path(change_id), &manifest)?;

    run_dispatch(paths, change_id, options, runner)
}
