//! JSON Schema contracts for persisted artifacts.

use anyhow::{Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

const MANIFEST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/manifest.schema.json"
));
const CHECKPOINT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/checkpoint.schema.json"
));
const REPORT_CARD_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/report_card.schema.json"
));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    Manifest,
    Checkpoint,
    ReportCard,
}

impl Contract {
    fn label(self) -> &'static str {
        match self {
            Contract::Manifest => "manifest",
            Contract::Checkpoint => "checkpoint",
            Contract::ReportCard => "report card",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Contract::Manifest => MANIFEST_SCHEMA,
            Contract::Checkpoint => CHECKPOINT_SCHEMA,
            Contract::ReportCard => REPORT_CARD_SCHEMA,
        }
    }
}

/// Validate `instance` against the contract, aggregating every violation into one error.
pub fn validate_schema(contract: Contract, instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(contract.source())
        .map_err(|err| anyhow!("parse {} schema: {err}", contract.label()))?;
    let compiled = validator_for(&schema)
        .map_err(|err| anyhow!("invalid {} schema: {err}", contract.label()))?;
    if compiled.is_valid(instance) {
        return Ok(());
    }
    let messages = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(anyhow!(
        "{} schema validation failed: {}",
        contract.label(),
        messages.join("; ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_manifest() {
        let manifest = json!({
            "changeId": "REQ-1",
            "goal": "g",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "tasks": [{"id": "T001", "title": "t", "run": ["true"]}]
        });
        validate_schema(Contract::Manifest, &manifest).expect("valid");
    }

    #[test]
    fn aggregates_every_violation() {
        let manifest = json!({
            "changeId": "FEAT-1",
            "goal": "",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "tasks": [{"id": "t1", "title": "t", "run": []}]
        });
        let err = validate_schema(Contract::Manifest, &manifest).expect_err("invalid");
        let msg = err.to_string();
        assert!(msg.starts_with("manifest schema validation failed:"));
        assert!(msg.matches("; ").count() >= 3, "{msg}");
    }

    #[test]
    fn report_card_requires_overall() {
        let card = json!({
            "changeId": "REQ-1",
            "quickGates": [],
            "strictGates": [],
            "review": {"status": "skipped"},
            "blockingFindings": [],
            "timestamp": "2024-01-01T00:00:00Z"
        });
        let err = validate_schema(Contract::ReportCard, &card).expect_err("invalid");
        assert!(err.to_string().contains("overall"));
    }
}
