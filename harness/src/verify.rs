//! Verify: layered quality gates and the report card.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::findings::{collect_blocking_findings, overall_for};
use crate::core::text::{failure_text, truncate_chars};
use crate::core::types::{GateResult, GateStatus, Overall, ReportCard, ReviewResult};
use crate::io::config::HarnessConfig;
use crate::io::manifest_store::load_change_manifest;
use crate::io::paths::HarnessPaths;
use crate::io::process::{CommandOutcome, CommandRunner, run_or_fail};
use crate::io::report_store::write_report_card;
use crate::manifest::ChangeId;

pub const QUICK_GATES: [&str; 3] = ["lint", "typecheck", "test"];
pub const STRICT_GATES: [&str; 2] = ["integration", "audit"];

const DETAILS_LIMIT: usize = 400;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Also run strict gates and the review gate.
    pub strict: bool,
    pub skip_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub change_id: ChangeId,
    pub output_path: PathBuf,
    pub overall: Overall,
    pub blocking_findings: Vec<String>,
}

/// Run every gate and persist the report card.
///
/// Gate and task failures land in the report; `Err` only for unreadable input
/// or unwritable output.
#[instrument(skip_all, fields(change_id = %change_id, strict = options.strict))]
pub fn run_verify<R: CommandRunner>(
    paths: &HarnessPaths,
    change_id: &ChangeId,
    config: &HarnessConfig,
    options: &VerifyOptions,
    runner: &R,
) -> Result<VerifyOutcome> {
    let manifest = load_change_manifest(paths, change_id)?;
    let gates = GateRunner {
        paths,
        config,
        runner,
    };

    let quick_gates: Vec<GateResult> = QUICK_GATES.iter().map(|name| gates.run(name)).collect();
    let strict_gates: Vec<GateResult> = if options.strict {
        STRICT_GATES.iter().map(|name| gates.run(name)).collect()
    } else {
        Vec::new()
    };
    let review = gates.review(options);

    let blocking_findings =
        collect_blocking_findings(&manifest, &quick_gates, &strict_gates, &review);
    let card = ReportCard {
        change_id: change_id.clone(),
        overall: overall_for(&blocking_findings),
        quick_gates,
        strict_gates,
        review,
        blocking_findings,
        timestamp: Utc::now(),
    };

    let output_path = paths.report_card_path(change_id);
    write_report_card(&output_path, &card)?;

    info!(
        overall = card.overall.as_str(),
        findings = card.blocking_findings.len(),
        "verification finished"
    );
    Ok(VerifyOutcome {
        change_id: change_id.clone(),
        output_path,
        overall: card.overall,
        blocking_findings: card.blocking_findings,
    })
}

struct GateRunner<'a, R> {
    paths: &'a HarnessPaths,
    config: &'a HarnessConfig,
    runner: &'a R,
}

impl<R: CommandRunner> GateRunner<'_, R> {
    fn run(&self, name: &str) -> GateResult {
        let Some(command) = self.config.gate_command(name) else {
            return GateResult {
                name: name.to_string(),
                status: GateStatus::Skipped,
                command: String::new(),
                duration_ms: 0,
                details: format!("Gate {name} is not configured"),
            };
        };

        let outcome = self.exec(command, self.config.gate_timeout());
        let (status, details) = if outcome.success() {
            (GateStatus::Pass, "ok".to_string())
        } else {
            warn!(gate = name, code = outcome.code, "gate failed");
            (
                GateStatus::Fail,
                truncate_chars(
                    &failure_text(&outcome.stderr, &outcome.stdout, "command failed"),
                    DETAILS_LIMIT,
                ),
            )
        };
        GateResult {
            name: name.to_string(),
            status,
            command: command.to_string(),
            duration_ms: outcome.duration_ms,
            details,
        }
    }

    fn review(&self, options: &VerifyOptions) -> ReviewResult {
        if !options.strict {
            return review(GateStatus::Skipped, "Strict mode disabled");
        }
        if options.skip_review {
            return review(GateStatus::Skipped, "Skipped by --skip-review");
        }
        let Some(command) = self.config.review.command.as_deref() else {
            return review(
                GateStatus::Fail,
                "review command is not configured; rerun with --skip-review if intentional",
            );
        };
        let tool = command.split_whitespace().next().unwrap_or(command);

        let probe = self.exec(&format!("command -v {tool}"), self.config.gate_timeout());
        if !probe.success() {
            warn!(tool, "review tool not found");
            return review(
                GateStatus::Fail,
                &format!("{tool} binary not found; rerun with --skip-review if intentional"),
            );
        }

        let outcome = self.exec(command, self.config.review_timeout());
        if !outcome.success() {
            let fallback = format!("{tool} review failed");
            return review(
                GateStatus::Fail,
                &truncate_chars(
                    &failure_text(&outcome.stderr, &outcome.stdout, &fallback),
                    DETAILS_LIMIT,
                ),
            );
        }
        review(GateStatus::Pass, &format!("{tool} review passed"))
    }

    fn exec(&self, command: &str, timeout: Duration) -> CommandOutcome {
        run_or_fail(self.runner, command, &self.paths.root, timeout)
    }
}

fn review(status: GateStatus, details: &str) -> ReviewResult {
    ReviewResult {
        status,
        details: details.to_string(),
    }
}
