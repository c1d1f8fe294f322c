// crates/stream-query/src/expand/tests.rs
// ============================================================================
// Module: Stream Query Expansion Tests
// Description: Unit tests for closure lookup and tree folding.
// Purpose: Verify expansion semantics, exclusions, de-duplication and failures.
// Dependencies: stream-query, tokio
// ============================================================================

//! ## Overview
//! Runs [`expand`](super::expand) against a small in-memory tree
//! (`A -> {B, C}`, `D -> {E, F}`) and against counting or failing oracles.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use super::expand;
use crate::error::QueryError;
use crate::identifiers::StoreId;
use crate::identifiers::StreamRef;
use crate::interfaces::ExpansionError;
use crate::interfaces::StreamExpander;
use crate::memory::InMemoryStreamTree;
use crate::query::Expr;
use crate::query::QueryNode;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds the `A -> {B, C}`, `D -> {E, F}` tree in the local store.
fn tree() -> InMemoryStreamTree {
    let local = StoreId::local();
    InMemoryStreamTree::new()
        .with_stream(&local, "A", None)
        .with_stream(&local, "B", Some("A"))
        .with_stream(&local, "C", Some("A"))
        .with_stream(&local, "D", None)
        .with_stream(&local, "E", Some("D"))
        .with_stream(&local, "F", Some("D"))
        .with_stream(&StoreId::audit(), "access-1", None)
}

/// Local reference shorthand.
fn local(id: &str) -> StreamRef {
    StreamRef::local(id)
}

/// Oracle that counts calls and delegates to the fixture tree.
struct CountingExpander {
    /// Delegate tree.
    tree: InMemoryStreamTree,
    /// Number of oracle calls.
    calls: AtomicUsize,
}

#[async_trait]
impl StreamExpander for CountingExpander {
    async fn expand_one(
        &self,
        store: &StoreId,
        stream_id: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<String>, ExpansionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tree.expand_one(store, stream_id, excluded).await
    }
}

/// Oracle that always fails.
struct FailingExpander;

#[async_trait]
impl StreamExpander for FailingExpander {
    async fn expand_one(
        &self,
        _store: &StoreId,
        _stream_id: &str,
        _excluded: &BTreeSet<String>,
    ) -> Result<Vec<String>, ExpansionError> {
        Err(ExpansionError::Backend("offline".to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn expand_becomes_in_of_descendants() {
    let node = expand(Expr::expand(local("A")), &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::in_set(["A", "B", "C"])));
}

#[tokio::test]
async fn not_becomes_or_of_notin_per_id() {
    let expr = Expr::Not {
        ids: vec![local("A"), local("E")],
        excluded: Vec::new(),
    };
    let node = expand(expr, &tree()).await.unwrap();
    assert_eq!(
        node,
        Some(QueryNode::Or(vec![
            QueryNode::not_in_set(["A", "B", "C"]),
            QueryNode::not_in_set(["E"]),
        ]))
    );
}

#[tokio::test]
async fn exclusions_skip_subtrees() {
    let expr = Expr::Expand {
        id: local("A"),
        excluded: vec![local("B")],
    };
    let node = expand(expr, &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::in_set(["A", "C"])));
}

#[tokio::test]
async fn exclusions_from_other_stores_are_ignored() {
    let expr = Expr::Expand {
        id: local("A"),
        excluded: vec![StreamRef::new(StoreId::audit(), "B")],
    };
    let node = expand(expr, &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::in_set(["A", "B", "C"])));
}

#[tokio::test]
async fn foreign_store_closures_are_qualified() {
    let expr = Expr::expand(StreamRef::new(StoreId::audit(), "access-1"));
    let node = expand(expr, &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::in_set([":_audit:access-1"])));
}

#[tokio::test]
async fn empty_closures_drop_their_clause() {
    let expr = Expr::and(vec![Expr::expand(local("A")), Expr::expand(local("Z"))]);
    let node = expand(expr, &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::And(vec![QueryNode::in_set(["A", "B", "C"])])));
    assert_eq!(expand(Expr::expand(local("Z")), &tree()).await.unwrap(), None);
}

#[tokio::test]
async fn wildcard_expands_to_every_stream_of_the_store() {
    let node = expand(Expr::expand(local("*")), &tree()).await.unwrap();
    assert_eq!(node, Some(QueryNode::in_set(["A", "B", "C", "D", "E", "F"])));
}

#[tokio::test]
async fn duplicate_requests_hit_the_oracle_once() {
    let expander = CountingExpander {
        tree: tree(),
        calls: AtomicUsize::new(0),
    };
    let expr = Expr::or(vec![
        Expr::expand(local("A")),
        Expr::expand(local("A")),
        Expr::NotExpand {
            id: local("A"),
            excluded: Vec::new(),
        },
        Expr::expand(local("D")),
    ]);
    expand(expr, &expander).await.unwrap();
    assert_eq!(expander.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn oracle_failures_are_expansion_errors() {
    let err = expand(Expr::expand(local("A")), &FailingExpander).await.unwrap_err();
    assert!(matches!(err, QueryError::Expansion(_)));
}

#[tokio::test]
async fn plain_leaves_need_no_oracle() {
    let expr = Expr::and(vec![Expr::Equal(local("A")), Expr::NotIn(vec![local("B"), local("C")])]);
    let node = expand(expr, &FailingExpander).await.unwrap();
    assert_eq!(
        node,
        Some(QueryNode::And(vec![
            QueryNode::Equal("A".to_string()),
            QueryNode::not_in_set(["B", "C"]),
        ]))
    );
}
