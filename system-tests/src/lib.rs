// system-tests/src/lib.rs
// ============================================================================
// Module: Stream Query System Tests Library
// Description: Shared fixtures and backends for system test scenarios.
// Purpose: Provide the event corpus and storage backends used by test suites.
// Dependencies: rusqlite, serde_json, stream-query
// ============================================================================

//! ## Overview
//! This crate hosts the reference event corpus, a document-filter evaluator
//! and an `SQLite` FTS5 event index used by the system-test suites in
//! `system-tests/tests`. Compiled filters are executed against both backends
//! and compared with in-memory evaluation of the canonical tree.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod corpus;
pub mod fts;
