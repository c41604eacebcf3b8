//! Shell command execution with timeouts and bounded output.
//!
//! The [`CommandRunner`] trait decouples the dispatcher and verifier from real
//! process spawning. Tests use scripted runners that return predetermined exit
//! codes without touching the shell.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Outcome of one shell command, failures included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == 0 && !self.timed_out
    }

    /// Outcome for a command that could not be started at all.
    pub fn spawn_failure(err: &anyhow::Error, duration_ms: u64) -> Self {
        Self {
            code: 1,
            stdout: String::new(),
            stderr: format!("{err:#}"),
            duration_ms,
            timed_out: false,
        }
    }
}

/// Abstraction over command execution backends.
///
/// `Sync` because one runner is shared by every task executing in a batch.
pub trait CommandRunner: Sync {
    /// Run `command` in `workdir`. Non-zero exits and timeouts are reported in
    /// the outcome; `Err` is reserved for failures to run the command at all.
    fn run(&self, command: &str, workdir: &Path, timeout: Duration) -> Result<CommandOutcome>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    pub output_limit_bytes: usize,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

impl CommandRunner for ShellRunner {
    #[instrument(skip_all, fields(command = command, timeout_secs = timeout.as_secs()))]
    fn run(&self, command: &str, workdir: &Path, timeout: Duration) -> Result<CommandOutcome> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(workdir);

        let started = Instant::now();
        let output = run_command_with_timeout(cmd, timeout, self.output_limit_bytes)?;
        let duration_ms = elapsed_ms(started);

        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.timed_out {
            stderr.push_str(&format!("\ncommand timed out after {}s", timeout.as_secs()));
        }
        stderr.push_str(&output.stderr_truncated_notice());

        Ok(CommandOutcome {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            duration_ms,
            timed_out: output.timed_out,
        })
    }
}

/// Run through `runner`, folding a spawn error into a failed outcome.
pub fn run_or_fail<R: CommandRunner + ?Sized>(
    runner: &R,
    command: &str,
    workdir: &Path,
    timeout: Duration,
) -> CommandOutcome {
    let started = Instant::now();
    match runner.run(command, workdir, timeout) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(command, err = %format!("{err:#}"), "command could not run");
            CommandOutcome::spawn_failure(&err, elapsed_ms(started))
        }
    }
}

pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_truncated_notice(&self) -> String {
        if self.stderr_truncated > 0 {
            format!("\n[stderr truncated {} bytes]", self.stderr_truncated)
        } else {
            String::new()
        }
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// A child still running at the deadline is killed and reported with `timed_out`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
