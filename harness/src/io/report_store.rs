//! Report card persistence (`report-card.json`).

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::core::types::ReportCard;
use crate::io::schema::{Contract, validate_schema};
use crate::io::store::{read_text, write_json};

pub fn write_report_card(path: &Path, card: &ReportCard) -> Result<()> {
    let value = serde_json::to_value(card).context("serialize report card")?;
    validate_schema(Contract::ReportCard, &value)?;
    debug!(path = %path.display(), overall = card.overall.as_str(), "writing report card");
    write_json(path, &value)
}

pub fn load_report_card(path: &Path) -> Result<ReportCard> {
    let contents = read_text(path)?.with_context(|| {
        format!(
            "report card not found {} (run `harness verify` first)",
            path.display()
        )
    })?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse report card {}", path.display()))?;
    validate_schema(Contract::ReportCard, &value)
        .with_context(|| format!("validate report card {}", path.display()))?;
    serde_json::from_value(value)
        .with_context(|| format!("deserialize report card {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::core::types::{GateResult, GateStatus, Overall, ReviewResult};
    use crate::manifest::ChangeId;

    #[test]
    fn write_then_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report-card.json");
        let card = ReportCard {
            change_id: ChangeId::parse("REQ-1").expect("change"),
            overall: Overall::Fail,
            quick_gates: vec![GateResult {
                name: "lint".to_string(),
                status: GateStatus::Fail,
                command: "false".to_string(),
                duration_ms: 3,
                details: "boom".to_string(),
            }],
            strict_gates: Vec::new(),
            review: ReviewResult {
                status: GateStatus::Skipped,
                details: "Strict mode disabled".to_string(),
            },
            blocking_findings: vec!["lint: boom".to_string()],
            timestamp: Utc::now(),
        };
        write_report_card(&path, &card).expect("write");
        assert_eq!(load_report_card(&path).expect("load"), card);
    }

    #[test]
    fn missing_card_points_at_verify() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_report_card(&temp.path().join("report-card.json")).expect_err("missing");
        assert!(err.to_string().contains("harness verify"));
    }
}
