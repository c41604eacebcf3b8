//! Harness configuration stored under `.harness/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::store::write_text;

/// Harness configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults and a missing file
/// means "all defaults".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Tasks executed concurrently per batch when `--parallel` is not given.
    pub parallel: usize,

    /// Per-command timeout for task `run`/`checks` commands.
    pub command_timeout_secs: u64,

    /// Per-gate timeout for verification gates.
    pub gate_timeout_secs: u64,

    /// Timeout for the external review command.
    pub review_timeout_secs: u64,

    /// Bytes of stdout/stderr kept per command.
    pub output_limit_bytes: usize,

    /// Runtime task directories older than this are reclaimed by the janitor.
    pub retention_hours: u64,

    /// Gate name -> shell command. Unlisted gates are reported as skipped.
    pub gates: BTreeMap<String, String>,

    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Review command; its first word must resolve on `PATH`.
    pub command: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            command: Some("codex review --base main".to_string()),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            parallel: 3,
            command_timeout_secs: 30 * 60,
            gate_timeout_secs: 20 * 60,
            review_timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            retention_hours: 72,
            gates: BTreeMap::new(),
            review: ReviewConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallel == 0 {
            return Err(anyhow!("parallel must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.gate_timeout_secs == 0 {
            return Err(anyhow!("gate_timeout_secs must be > 0"));
        }
        if self.review_timeout_secs == 0 {
            return Err(anyhow!("review_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (name, command) in &self.gates {
            if command.trim().is_empty() {
                return Err(anyhow!("gates.{name} must be a non-empty command"));
            }
        }
        if let Some(command) = &self.review.command
            && command.trim().is_empty()
        {
            return Err(anyhow!("review.command must be non-empty when set"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.gate_timeout_secs)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.review_timeout_secs)
    }

    pub fn gate_command(&self, name: &str) -> Option<&str> {
        self.gates.get(name).map(String::as_str)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_text(path, &buf)
}
