//! Checkpointed task orchestration for a single change (`REQ-123` / `BUG-7`).
//!
//! A change moves through `init → pack → plan → dispatch (resume) → verify →
//! release`, with `janitor` reclaiming old runtime state independently. The
//! crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (checklist parsing, invariants,
//!   scheduling, findings). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, schema validation,
//!   git, process execution). Isolated behind [`io::process::CommandRunner`]
//!   so tests can script command outcomes.
//!
//! Operation modules ([`init`], [`pack`], [`plan`], [`dispatch`], [`resume`],
//! [`verify`], [`release`], [`janitor`]) coordinate core logic with I/O to
//! implement CLI commands. Each takes an explicit [`io::paths::HarnessPaths`].

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod init;
pub mod io;
pub mod janitor;
pub mod logging;
pub mod manifest;
pub mod pack;
pub mod plan;
pub mod release;
pub mod resume;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod verify;
