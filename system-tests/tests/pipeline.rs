// system-tests/tests/pipeline.rs
// ============================================================================
// Module: Pipeline Suite
// Description: Aggregates end-to-end query pipeline tests into one binary.
// Purpose: Run compiled filters against real backends in one test binary.
// Dependencies: suites/*, system-tests
// ============================================================================

//! ## Overview
//! Aggregates end-to-end query pipeline tests into one binary.
//! Invariants:
//! - Compiled document and full-text filters select exactly the events the
//!   canonical tree matches in memory.
//! - Access-gated resolution never yields streams the access cannot read.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

#[path = "suites/access_gated.rs"]
mod access_gated;
#[path = "suites/document_filters.rs"]
mod document_filters;
#[path = "suites/fulltext_sqlite.rs"]
mod fulltext_sqlite;
