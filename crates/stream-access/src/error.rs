// crates/stream-access/src/error.rs
// ============================================================================
// Module: Stream Access Errors
// Description: Failures of permission resolution and access-gated queries.
// Purpose: Separate collaborator faults from query structure errors.
// Dependencies: stream-query, thiserror
// ============================================================================

//! ## Overview
//! Permission checks never fail for lack of permission; they answer `false`.
//! [`AccessError`] only reports infrastructure faults: the stream hierarchy
//! could not be read, or the shared index cache lock was poisoned.

use stream_query::QueryError;
use thiserror::Error;

/// Infrastructure failures during permission resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The stream hierarchy could not answer or is inconsistent.
    #[error("stream hierarchy error: {0}")]
    Hierarchy(String),
    /// The access index cache lock was poisoned.
    #[error("access index cache lock poisoned")]
    CachePoisoned,
}

/// Failures of access-gated query resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessQueryError {
    /// The query itself was rejected.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Permissions could not be resolved.
    #[error(transparent)]
    Access(#[from] AccessError),
}
