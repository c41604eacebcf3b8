//! Stable exit codes for harness CLI commands.

/// Command succeeded (dispatch finished clean, verify passed, release written).
pub const OK: i32 = 0;
/// Invalid input, failed validation, or an I/O error.
pub const INVALID: i32 = 1;
/// `dispatch`/`resume` left failed or pending tasks, or `verify` reported `fail`.
pub const FAILED: i32 = 2;
/// `release` refused because the report card is not `pass`.
pub const BLOCKED: i32 = 3;
