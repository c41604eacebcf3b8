//! Per-task audit artifacts under `.harness/runtime/<change>/<task>/`.
//!
//! `checkpoint.json` is overwritten on every transition; `events.jsonl` is
//! append-only. Callers write the checkpoint before the matching event.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::core::types::{Checkpoint, Event};
use crate::io::paths::HarnessPaths;
use crate::io::schema::{Contract, validate_schema};
use crate::io::store::{append_jsonl, read_text, write_json};

pub fn write_checkpoint(paths: &HarnessPaths, checkpoint: &Checkpoint) -> Result<()> {
    let value = serde_json::to_value(checkpoint).context("serialize checkpoint")?;
    validate_schema(Contract::Checkpoint, &value)?;
    let path = paths.checkpoint_path(&checkpoint.change_id, &checkpoint.task_id);
    debug!(task_id = %checkpoint.task_id, status = %checkpoint.status, "writing checkpoint");
    write_json(&path, &value)
}

pub fn append_event(paths: &HarnessPaths, event: &Event) -> Result<()> {
    let path = paths.events_path(&event.change_id, &event.task_id);
    debug!(task_id = %event.task_id, kind = event.kind.label(), "appending event");
    append_jsonl(&path, event)
}

/// Read a checkpoint file. `Ok(None)` when it does not exist; malformed content is an error.
pub fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
    let Some(contents) = read_text(path)? else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse checkpoint {}", path.display()))?;
    validate_schema(Contract::Checkpoint, &value)
        .with_context(|| format!("validate checkpoint {}", path.display()))?;
    let checkpoint = serde_json::from_value(value)
        .with_context(|| format!("deserialize checkpoint {}", path.display()))?;
    Ok(Some(checkpoint))
}

/// Every event recorded for a task, in append order.
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let Some(contents) = read_text(path)? else {
        return Ok(Vec::new());
    };
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}
