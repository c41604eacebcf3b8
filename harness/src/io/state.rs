//! Lifecycle state storage (`harness-state.json`).

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::core::types::HarnessState;
use crate::io::store::{read_json, write_json};

/// Load lifecycle state, or `None` before `init` ran.
pub fn load_state(path: &Path) -> Result<Option<HarnessState>> {
    debug!(path = %path.display(), "loading harness state");
    read_json(path)
}

/// Atomically write lifecycle state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &HarnessState) -> Result<()> {
    debug!(path = %path.display(), change_id = %state.change_id, status = ?state.status, "writing harness state");
    write_json(path, state)
}
