// crates/stream-access/src/hierarchy.rs
// ============================================================================
// Module: Stream Hierarchy
// Description: Async parent lookup used by permission inheritance.
// Purpose: Keep permission resolution independent of stream storage.
// Dependencies: async-trait, stream-query
// ============================================================================

//! ## Overview
//! Permissions granted on a stream apply to its descendants, so resolving a
//! level walks from a stream towards its root. [`StreamHierarchy`] answers one
//! step of that walk. The in-memory tree from `stream-query` implements it for
//! tests and embedded deployments.

use async_trait::async_trait;
use stream_query::InMemoryStreamTree;
use stream_query::StoreId;

use crate::error::AccessError;

/// Parent lookup for streams of a store.
#[async_trait]
pub trait StreamHierarchy: Send + Sync {
    /// Returns the parent of a stream, or `None` for roots and unknown streams.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the backing store fails.
    async fn parent_of(&self, store: &StoreId, stream: &str) -> Result<Option<String>, AccessError>;
}

#[async_trait]
impl StreamHierarchy for InMemoryStreamTree {
    async fn parent_of(&self, store: &StoreId, stream: &str) -> Result<Option<String>, AccessError> {
        Ok(Self::parent_of(self, store, stream).map(str::to_string))
    }
}
