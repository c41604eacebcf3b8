//! Git adapter used to describe the working tree in context packages.
//!
//! Read-only: the harness never stages or commits on its own.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Current branch name; `HEAD` when detached.
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Repository facts for humans; every field degrades instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFacts {
    pub branch: String,
    pub commit: String,
    /// `git status --short` lines, or `(clean)`.
    pub status: String,
}

impl RepoFacts {
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn collect(root: &Path) -> Self {
        let git = Git::new(root);
        let branch = git.current_branch().unwrap_or_else(|err| {
            warn!(err = %format!("{err:#}"), "git branch unavailable");
            UNKNOWN.to_string()
        });
        let commit = git.head_sha().unwrap_or_else(|_| UNKNOWN.to_string());
        let status = match git.status_porcelain() {
            Ok(entries) if entries.is_empty() => CLEAN.to_string(),
            Ok(entries) => entries
                .iter()
                .map(|e| format!("{} {}", e.code, e.path))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => UNKNOWN.to_string(),
        };
        debug!(%branch, %commit, "collected repo facts");
        Self {
            branch,
            commit,
            status,
        }
    }
}

const UNKNOWN: &str = "unknown";
const CLEAN: &str = "(clean)";

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_untracked_and_modified_lines() {
        assert_eq!(
            parse_status_line("?? foo.txt").expect("parse"),
            StatusEntry {
                code: "??".to_string(),
                path: "foo.txt".to_string()
            }
        );
        assert_eq!(
            parse_status_line(" M src/main.rs").expect("parse").code,
            " M"
        );
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.txt -> new.txt").expect("parse");
        assert_eq!(e.path, "new.txt");
    }

    #[test]
    fn facts_degrade_outside_a_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let facts = RepoFacts::collect(temp.path());
        assert_eq!(facts.commit, "unknown");
        assert_eq!(facts.status, "unknown");
    }
}
