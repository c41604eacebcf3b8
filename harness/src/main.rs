//! `harness` CLI: plan, dispatch, verify and release a change.
//!
//! Every command prints its result as pretty JSON on stdout; diagnostics go to
//! stderr (see `RUST_LOG`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harness::core::types::Overall;
use harness::dispatch::{DispatchOptions, DispatchOutcome, run_dispatch};
use harness::exit_codes;
use harness::init::run_init;
use harness::io::config::{HarnessConfig, load_config};
use harness::io::paths::{HarnessPaths, resolve_repo_root};
use harness::io::process::ShellRunner;
use harness::janitor::run_janitor;
use harness::logging;
use harness::manifest::ChangeId;
use harness::pack::run_pack;
use harness::plan::{PlanOptions, run_plan};
use harness::release::{ReleaseBlocked, run_release};
use harness::resume::run_resume;
use harness::verify::{VerifyOptions, run_verify};
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Checkpointed, dependency-aware task orchestration with gated release"
)]
struct Cli {
    /// Repository root (defaults to the nearest ancestor with `.harness`, `devflow` or `.git`).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ChangeArgs {
    /// Change identifier, e.g. `REQ-123` or `BUG-7`.
    #[arg(long)]
    change_id: ChangeId,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    change: ChangeArgs,
    /// Tasks per batch (defaults to `parallel` in `.harness/config.toml`).
    #[arg(long)]
    parallel: Option<usize>,
    /// Override every task's `maxRetries`.
    #[arg(long)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the requirement/runtime directories and lifecycle state.
    Init {
        #[command(flatten)]
        change: ChangeArgs,
        #[arg(long)]
        goal: Option<String>,
    },
    /// Write `context-package.md` with goal, repository facts and next steps.
    Pack {
        #[command(flatten)]
        change: ChangeArgs,
        #[arg(long)]
        goal: Option<String>,
    },
    /// Build `task-manifest.json` from `TASKS.md`.
    Plan {
        #[command(flatten)]
        change: ChangeArgs,
        #[arg(long)]
        goal: Option<String>,
        /// Replace an existing manifest.
        #[arg(long)]
        overwrite: bool,
    },
    /// Run pending tasks in dependency order.
    Dispatch(RunArgs),
    /// Repair an interrupted run, then dispatch.
    Resume(RunArgs),
    /// Run quality gates and write `report-card.json`.
    Verify {
        #[command(flatten)]
        change: ChangeArgs,
        /// Also run strict gates and the review gate.
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        skip_review: bool,
    },
    /// Write `RELEASE_NOTE.md` if the report card passed.
    Release {
        #[command(flatten)]
        change: ChangeArgs,
    },
    /// Remove stale runtime task directories.
    Janitor {
        /// Retention in hours (defaults to `retention_hours` in config).
        #[arg(long)]
        hours: Option<u64>,
    },
}

fn main() -> ExitCode {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help / --version
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("{err}");
            return exit_code(exit_codes::INVALID);
        }
    };
    match run(cli) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            if err.downcast_ref::<ReleaseBlocked>().is_some() {
                exit_code(exit_codes::BLOCKED)
            } else {
                exit_code(exit_codes::INVALID)
            }
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cli: Cli) -> Result<i32> {
    let root = match cli.root {
        Some(root) => root,
        None => resolve_repo_root(&std::env::current_dir().context("resolve current dir")?),
    };
    let paths = HarnessPaths::new(root);
    debug!(root = %paths.root.display(), "resolved repository root");
    let config = load_config(&paths.config_path)?;
    let runner = ShellRunner {
        output_limit_bytes: config.output_limit_bytes,
    };

    match cli.command {
        Command::Init { change, goal } => {
            print_json(&run_init(&paths, &change.change_id, goal.as_deref())?)?;
            Ok(exit_codes::OK)
        }
        Command::Pack { change, goal } => {
            print_json(&run_pack(&paths, &change.change_id, goal.as_deref())?)?;
            Ok(exit_codes::OK)
        }
        Command::Plan {
            change,
            goal,
            overwrite,
        } => {
            let options = PlanOptions { goal, overwrite };
            print_json(&run_plan(&paths, &change.change_id, &options)?)?;
            Ok(exit_codes::OK)
        }
        Command::Dispatch(args) => {
            let options = dispatch_options(&config, &args);
            finish_run(&run_dispatch(&paths, &args.change.change_id, &options, &runner)?)
        }
        Command::Resume(args) => {
            let options = dispatch_options(&config, &args);
            finish_run(&run_resume(&paths, &args.change.change_id, &options, &runner)?)
        }
        Command::Verify {
            change,
            strict,
            skip_review,
        } => {
            let options = VerifyOptions {
                strict,
                skip_review,
            };
            let outcome = run_verify(&paths, &change.change_id, &config, &options, &runner)?;
            print_json(&outcome)?;
            Ok(match outcome.overall {
                Overall::Pass => exit_codes::OK,
                Overall::Fail => exit_codes::FAILED,
            })
        }
        Command::Release { change } => {
            print_json(&run_release(&paths, &change.change_id)?)?;
            Ok(exit_codes::OK)
        }
        Command::Janitor { hours } => {
            let hours = hours.unwrap_or(config.retention_hours);
            print_json(&run_janitor(&paths, hours, SystemTime::now())?)?;
            Ok(exit_codes::OK)
        }
    }
}

fn dispatch_options(config: &HarnessConfig, args: &RunArgs) -> DispatchOptions {
    let mut options = DispatchOptions::from_config(config);
    if let Some(parallel) = args.parallel {
        options.parallel = parallel;
    }
    options.max_retries = args.max_retries;
    options
}

fn finish_run(outcome: &DispatchOutcome) -> Result<i32> {
    print_json(outcome)?;
    Ok(if outcome.success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

/// Print `value` as pretty-printed JSON with trailing newline.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
