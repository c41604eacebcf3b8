//! Markdown artifacts rendered with minijinja.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

const RELEASE_NOTE_TEMPLATE: &str = include_str!("templates/release_note.md");
const CONTEXT_PACKAGE_TEMPLATE: &str = include_str!("templates/context_package.md");

#[derive(Debug, Clone, Serialize)]
pub struct TaskLine {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseNoteInputs {
    pub change_id: String,
    pub released_at: String,
    /// `PASS` / `FAIL`.
    pub verification: String,
    pub passed: Vec<TaskLine>,
    pub failed_count: usize,
    pub findings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContextPackageInputs {
    pub change_id: String,
    pub generated_at: String,
    pub goal: String,
    pub branch: String,
    pub commit: String,
    pub status: String,
    pub gates: Vec<String>,
    pub next_commands: Vec<String>,
}

/// Template engine wrapper around minijinja.
struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_template("release_note.md", RELEASE_NOTE_TEMPLATE)
            .context("load release note template")?;
        env.add_template("context_package.md", CONTEXT_PACKAGE_TEMPLATE)
            .context("load context package template")?;
        Ok(Self { env })
    }
}

pub fn render_release_note(input: &ReleaseNoteInputs) -> Result<String> {
    let engine = TemplateEngine::new()?;
    let template = engine.env.get_template("release_note.md")?;
    let rendered = template
        .render(context! {
            change_id => input.change_id,
            released_at => input.released_at,
            verification => input.verification,
            passed => input.passed,
            failed_count => input.failed_count,
            findings => input.findings,
        })
        .context("render release note")?;
    Ok(rendered)
}

pub fn render_context_package(input: &ContextPackageInputs) -> Result<String> {
    let engine = TemplateEngine::new()?;
    let template = engine.env.get_template("context_package.md")?;
    let rendered = template
        .render(context! {
            change_id => input.change_id,
            generated_at => input.generated_at,
            goal => input.goal,
            branch => input.branch,
            commit => input.commit,
            status => input.status,
            gates => input.gates,
            next_commands => input.next_commands,
        })
        .context("render context package")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_inputs() -> ReleaseNoteInputs {
        ReleaseNoteInputs {
            change_id: "REQ-1".to_string(),
            released_at: "2024-01-01T00:00:00Z".to_string(),
            verification: "PASS".to_string(),
            passed: vec![TaskLine {
                id: "T001".to_string(),
                title: "Create <schema> & seed".to_string(),
            }],
            failed_count: 0,
            findings: Vec::new(),
        }
    }

    #[test]
    fn release_note_lists_tasks_and_none_sentinel() {
        let note = render_release_note(&release_inputs()).expect("render");
        assert!(note.starts_with("# Release Note - REQ-1\n"));
        assert!(note.contains("- Verification: PASS\n"));
        assert!(note.contains("- Passed: 1\n- Failed: 0\n"));
        assert!(note.contains("- T001: Create <schema> & seed\n"));
        assert!(note.contains("## Blocking Findings\n\n- (none)\n"));
        assert!(note.ends_with('\n'));
    }

    #[test]
    fn release_note_with_no_passed_tasks() {
        let mut inputs = release_inputs();
        inputs.passed.clear();
        let note = render_release_note(&inputs).expect("render");
        assert!(note.contains("## Completed Tasks\n\n- (none)\n"));
    }

    #[test]
    fn context_package_renders_gates_and_commands() {
        let pkg = render_context_package(&ContextPackageInputs {
            change_id: "REQ-2".to_string(),
            generated_at: "now".to_string(),
            goal: "Ship".to_string(),
            branch: "main".to_string(),
            commit: "abc".to_string(),
            status: "(clean)".to_string(),
            gates: vec!["lint".to_string(), "test".to_string()],
            next_commands: vec!["harness plan --change-id REQ-2".to_string()],
        })
        .expect("render");
        assert!(pkg.contains("- Goal: Ship\n"));
        assert!(pkg.contains("```text\n(clean)\n```"));
        assert!(pkg.contains("```text\nlint\ntest\n```"));
        assert!(pkg.contains("- `harness plan --change-id REQ-2`\n"));
    }
}
