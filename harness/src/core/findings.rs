//! Blocking-finding aggregation for the report card.

use crate::core::types::{GateResult, GateStatus, Overall, ReviewResult};
use crate::manifest::{Manifest, TaskStatus};

/// Collect every reason that blocks release, in a stable order:
/// failed tasks (manifest order), failed gates (quick then strict), review.
pub fn collect_blocking_findings(
    manifest: &Manifest,
    quick_gates: &[GateResult],
    strict_gates: &[GateResult],
    review: &ReviewResult,
) -> Vec<String> {
    let mut findings = Vec::new();

    for task in &manifest.tasks {
        if task.status == TaskStatus::Failed {
            let reason = task.last_error.as_deref().unwrap_or("task failed");
            findings.push(format!("{}: {reason}", task.id));
        }
    }

    for gate in quick_gates.iter().chain(strict_gates) {
        if gate.status == GateStatus::Fail {
            findings.push(format!("{}: {}", gate.name, gate.details));
        }
    }

    if review.status == GateStatus::Fail {
        findings.push(format!("review: {}", review.details));
    }

    findings
}

pub fn overall_for(findings: &[String]) -> Overall {
    if findings.is_empty() {
        Overall::Pass
    } else {
        Overall::Fail
    }
}
