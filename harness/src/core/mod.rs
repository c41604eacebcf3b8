//! Deterministic, pure logic shared by the harness operations.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod checklist;
pub mod findings;
pub mod invariants;
pub mod scheduler;
pub mod text;
pub mod types;
