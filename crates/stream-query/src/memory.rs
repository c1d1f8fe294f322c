// crates/stream-query/src/memory.rs
// ============================================================================
// Module: In-Memory Stream Tree
// Description: Immutable stream hierarchy held in memory.
// Purpose: Provide a deterministic expansion oracle for tests and embedders.
// Dependencies: async-trait, crate::{identifiers, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryStreamTree`] stores parent links per store and answers
//! [`StreamExpander`] requests with a depth-first walk. It is intended for
//! tests, demos and small deployments where the whole tree fits in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::identifiers::StoreId;
use crate::identifiers::WILDCARD;
use crate::interfaces::ExpansionError;
use crate::interfaces::StreamExpander;

// ============================================================================
// SECTION: Stream Tree
// ============================================================================

/// Streams of one store.
#[derive(Debug, Clone, Default)]
struct StoreStreams {
    /// Parent of every known stream (`None` for roots).
    parents: BTreeMap<String, Option<String>>,
    /// Children of every stream that has any.
    children: BTreeMap<String, Vec<String>>,
}

/// In-memory stream hierarchy spanning several stores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamTree {
    /// Streams per store.
    stores: BTreeMap<StoreId, StoreStreams>,
}

impl InMemoryStreamTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tree with an additional stream.
    ///
    /// Children are visited in insertion order.
    #[must_use]
    pub fn with_stream(mut self, store: &StoreId, stream: &str, parent: Option<&str>) -> Self {
        self.insert(store, stream, parent);
        self
    }

    /// Adds a stream below `parent` (or as a root).
    pub fn insert(&mut self, store: &StoreId, stream: &str, parent: Option<&str>) {
        let streams = self.stores.entry(store.clone()).or_default();
        streams.parents.insert(stream.to_string(), parent.map(ToString::to_string));
        if let Some(parent) = parent {
            streams.children.entry(parent.to_string()).or_default().push(stream.to_string());
        }
    }

    /// Returns true when the stream exists.
    #[must_use]
    pub fn contains(&self, store: &StoreId, stream: &str) -> bool {
        self.stores.get(store).is_some_and(|streams| streams.parents.contains_key(stream))
    }

    /// Returns the parent of a stream; `None` for roots and unknown streams.
    #[must_use]
    pub fn parent_of(&self, store: &StoreId, stream: &str) -> Option<&str> {
        self.stores.get(store)?.parents.get(stream)?.as_deref()
    }

    /// Returns the stream and its descendants, skipping excluded subtrees.
    #[must_use]
    pub fn descendants(
        &self,
        store: &StoreId,
        stream: &str,
        excluded: &BTreeSet<String>,
    ) -> Vec<String> {
        let Some(streams) = self.stores.get(store) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if stream == WILDCARD {
            let roots = streams.parents.iter().filter(|(_, parent)| parent.is_none());
            for (root, _) in roots {
                walk(streams, root, excluded, &mut out);
            }
        } else if streams.parents.contains_key(stream) {
            walk(streams, stream, excluded, &mut out);
        }
        out
    }
}

/// Depth-first walk that skips excluded streams and their subtrees.
fn walk(streams: &StoreStreams, stream: &str, excluded: &BTreeSet<String>, out: &mut Vec<String>) {
    if excluded.contains(stream) {
        return;
    }
    out.push(stream.to_string());
    for child in streams.children.get(stream).into_iter().flatten() {
        walk(streams, child, excluded, out);
    }
}

#[async_trait]
impl StreamExpander for InMemoryStreamTree {
    async fn expand_one(
        &self,
        store: &StoreId,
        stream_id: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<String>, ExpansionError> {
        Ok(self.descendants(store, stream_id, excluded))
    }
}
