// crates/stream-query/src/interfaces.rs
// ============================================================================
// Module: Stream Query Interfaces
// Description: Collaborator seams consumed by the query pipeline.
// Purpose: Define the authorization oracle and the async expansion oracle.
// Dependencies: async-trait, thiserror, crate::identifiers
// ============================================================================

//! ## Overview
//! The pipeline never reads stream storage or access records directly. It asks
//! a [`StreamAuthorizer`] whether an identifier may be read, and a
//! [`StreamExpander`] for the descendant closure of a stream. Implementations
//! must be deterministic for the lifetime of one request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::identifiers::StoreId;
use crate::identifiers::StreamRef;

// ============================================================================
// SECTION: Authorization Oracle
// ============================================================================

/// Decides whether an identifier may appear in the caller's query.
///
/// Identifiers for which this returns `false` are silently removed from the
/// query and reported as non-authorized.
pub trait StreamAuthorizer {
    /// Returns true when the caller may read events of the stream.
    fn is_authorized(&self, stream: &StreamRef) -> bool;
}

impl<F> StreamAuthorizer for F
where
    F: Fn(&StreamRef) -> bool,
{
    fn is_authorized(&self, stream: &StreamRef) -> bool {
        (self)(stream)
    }
}

/// Authorizer that admits every identifier (trusted internal callers).
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl StreamAuthorizer for AllowAll {
    fn is_authorized(&self, _stream: &StreamRef) -> bool {
        true
    }
}

// ============================================================================
// SECTION: Expansion Oracle
// ============================================================================

/// Failures reported by an expansion oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    /// The backing store could not answer.
    #[error("stream store error: {0}")]
    Backend(String),
}

/// Resolves a stream into its descendant closure within one store.
#[async_trait]
pub trait StreamExpander: Send + Sync {
    /// Returns the stream and all of its descendants.
    ///
    /// Streams listed in `excluded` are skipped and their subtrees are not
    /// visited. Unknown streams yield an empty closure.
    ///
    /// # Errors
    ///
    /// Returns [`ExpansionError`] when the backing store fails.
    async fn expand_one(
        &self,
        store: &StoreId,
        stream_id: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<String>, ExpansionError>;
}
