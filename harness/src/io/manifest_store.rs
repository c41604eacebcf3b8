//! Manifest load/save helpers with schema + invariant validation.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::io::paths::HarnessPaths;
use crate::io::schema::{Contract, validate_schema};
use crate::io::store::{read_text, write_json};
use crate::manifest::{ChangeId, Manifest};

/// Load and validate a manifest from disk (schema + invariants).
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents =
        read_text(path)?.with_context(|| format!("manifest not found {}", path.display()))?;
    parse_manifest(&contents).with_context(|| format!("load manifest {}", path.display()))
}

/// Load the manifest of `change_id`, refusing one that belongs to another change.
pub fn load_change_manifest(paths: &HarnessPaths, change_id: &ChangeId) -> Result<Manifest> {
    let path = paths.manifest_path(change_id);
    if !path.exists() {
        return Err(anyhow!(
            "manifest not found {} (run `harness plan --change-id {change_id}` first)",
            path.display()
        ));
    }
    let manifest = load_manifest(&path)?;
    if &manifest.change_id != change_id {
        return Err(anyhow!(
            "manifest {} belongs to {}, not {change_id}",
            path.display(),
            manifest.change_id
        ));
    }
    debug!(tasks = manifest.tasks.len(), "manifest loaded");
    Ok(manifest)
}

pub fn parse_manifest(contents: &str) -> Result<Manifest> {
    let value: Value = serde_json::from_str(contents).context("parse manifest json")?;
    validate_schema(Contract::Manifest, &value)?;
    let manifest: Manifest = serde_json::from_value(value).context("deserialize manifest")?;
    check_invariants(&manifest)?;
    Ok(manifest)
}

/// Validate then atomically write. Nothing is written if validation fails.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    validate_manifest(manifest)?;
    debug!(path = %path.display(), tasks = manifest.tasks.len(), "writing manifest");
    write_json(path, manifest)
}

pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    let value = serde_json::to_value(manifest).context("serialize manifest")?;
    validate_schema(Contract::Manifest, &value)?;
    check_invariants(manifest)
}

fn check_invariants(manifest: &Manifest) -> Result<()> {
    let errors = validate_invariants(manifest);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("manifest invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manifest, task, task_after};

    #[test]
    fn write_then_load_preserves_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("task-manifest.json");
        let original = manifest(vec![task("T001"), task_after("T002", &["T001"])]);

        write_manifest(&path, &original).expect("write");
        let loaded = load_manifest(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn refuses_to_write_cyclic_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("task-manifest.json");
        let cyclic = manifest(vec![task_after("T001", &["T002"]), task_after("T002", &["T001"])]);

        let err = write_manifest(&path, &cyclic).expect_err("cycle");
        assert!(err.to_string().contains("dependency cycle"));
        assert!(!path.exists());
    }

    #[test]
    fn load_reports_schema_errors() {
        let err = parse_manifest(r#"{"changeId":"REQ-1","goal":"g","tasks":[]}"#)
            .expect_err("invalid");
        assert!(err.to_string().contains("manifest schema validation failed"));
    }

    #[test]
    fn load_change_manifest_requires_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        let change = ChangeId::parse("REQ-9").expect("change");
        let err = load_change_manifest(&paths, &change).expect_err("missing");
        assert!(err.to_string().contains("harness plan"));
    }
}
