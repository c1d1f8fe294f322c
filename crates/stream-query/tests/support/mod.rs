// crates/stream-query/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared fixtures and result helpers for stream query tests.
// ============================================================================
//! ## Overview
//! Result-based assertion helpers plus the reference stream tree used by the
//! resolver integration tests.

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

use std::error::Error;
use std::fmt;

use stream_query::InMemoryStreamTree;
use stream_query::StoreId;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across stream query integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl TestError {
    /// Creates a new test error with the provided message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition { Ok(()) } else { Err(Box::new(TestError::new(message))) }
}

// ========================================================================
// Stream Fixtures
// ========================================================================

/// Builds `A -> {B, C}` and `D -> {E, F}` in the local store, plus one
/// audit stream and one account stream.
pub fn reference_tree() -> InMemoryStreamTree {
    let local = StoreId::local();
    InMemoryStreamTree::new()
        .with_stream(&local, "A", None)
        .with_stream(&local, "B", Some("A"))
        .with_stream(&local, "C", Some("A"))
        .with_stream(&local, "D", None)
        .with_stream(&local, "E", Some("D"))
        .with_stream(&local, "F", Some("D"))
        .with_stream(&StoreId::audit(), "access-1", None)
        .with_stream(&StoreId::system(), "email", None)
}
