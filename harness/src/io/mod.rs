//! I/O helpers for harness operations.

pub mod config;
pub mod git;
pub mod manifest_store;
pub mod paths;
pub mod process;
pub mod report_store;
pub mod runtime_log;
pub mod schema;
pub mod state;
pub mod store;
pub mod templates;
