// crates/stream-query/src/optimize/tests.rs
// ============================================================================
// Module: Stream Query Optimizer Tests
// Description: Unit tests for canonicalization and post-condition checks.
// Purpose: Pin merge, splice and collapse rules.
// Dependencies: stream-query
// ============================================================================

//! ## Overview
//! Hand-built trees are optimized and compared against their canonical form;
//! [`verify_canonical`](super::verify_canonical) must reject non-canonical
//! shapes.

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

use super::optimize;
use super::optimize_option;
use super::verify_canonical;
use crate::error::QueryError;
use crate::query::QueryNode;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn singleton_in_collapses_to_equal() {
    assert_eq!(optimize(QueryNode::in_set(["A"])), Some(QueryNode::Equal("A".to_string())));
    assert_eq!(
        optimize(QueryNode::not_in_set(["A"])),
        Some(QueryNode::NotEqual("A".to_string()))
    );
    assert_eq!(optimize(QueryNode::in_set(Vec::<String>::new())), None);
}

#[test]
fn or_merges_membership_leaves() {
    let node = QueryNode::Or(vec![
        QueryNode::in_set(["A", "B", "C"]),
        QueryNode::in_set(["B"]),
    ]);
    assert_eq!(optimize(node), Some(QueryNode::in_set(["A", "B", "C"])));

    let node = QueryNode::Or(vec![
        QueryNode::Equal("A".to_string()),
        QueryNode::NotEqual("B".to_string()),
        QueryNode::not_in_set(["C", "D"]),
        QueryNode::And(vec![QueryNode::Equal("E".to_string()), QueryNode::Equal("F".to_string())]),
    ]);
    assert_eq!(
        optimize(node),
        Some(QueryNode::Or(vec![
            QueryNode::Equal("A".to_string()),
            QueryNode::not_in_set(["B", "C", "D"]),
            QueryNode::And(vec![
                QueryNode::Equal("E".to_string()),
                QueryNode::Equal("F".to_string()),
            ]),
        ]))
    );
}

#[test]
fn nested_containers_are_spliced() {
    let node = QueryNode::And(vec![
        QueryNode::And(vec![QueryNode::Equal("A".to_string()), QueryNode::Equal("B".to_string())]),
        QueryNode::Or(vec![QueryNode::Or(vec![QueryNode::in_set(["C", "D"])])]),
    ]);
    assert_eq!(
        optimize(node),
        Some(QueryNode::And(vec![
            QueryNode::Equal("A".to_string()),
            QueryNode::Equal("B".to_string()),
            QueryNode::in_set(["C", "D"]),
        ]))
    );
}

#[test]
fn and_does_not_merge_sets_and_prunes_nothing_children() {
    let node = QueryNode::And(vec![
        QueryNode::in_set(["A", "B"]),
        QueryNode::in_set(Vec::<String>::new()),
        QueryNode::in_set(["B", "C"]),
    ]);
    assert_eq!(
        optimize(node),
        Some(QueryNode::And(vec![QueryNode::in_set(["A", "B"]), QueryNode::in_set(["B", "C"])]))
    );
    assert_eq!(optimize(QueryNode::And(vec![QueryNode::Or(Vec::new())])), None);
    assert_eq!(optimize_option(None), None);
}

#[test]
fn optimized_trees_are_canonical() {
    let node = QueryNode::Or(vec![
        QueryNode::And(vec![QueryNode::in_set(["A"]), QueryNode::Or(vec![QueryNode::Equal("B".to_string())])]),
        QueryNode::in_set(["C"]),
        QueryNode::Or(vec![QueryNode::not_in_set(["D", "E"])]),
    ]);
    let optimized = optimize(node).unwrap();
    verify_canonical(&optimized).unwrap();
    assert_eq!(optimize(optimized.clone()), Some(optimized));
}

#[test]
fn verify_canonical_rejects_raw_shapes() {
    let raw = [
        QueryNode::in_set(["A"]),
        QueryNode::And(vec![QueryNode::Equal("A".to_string())]),
        QueryNode::Or(vec![
            QueryNode::Or(vec![QueryNode::Equal("A".to_string()), QueryNode::Equal("B".to_string())]),
            QueryNode::Equal("C".to_string()),
        ]),
        QueryNode::Or(vec![QueryNode::Equal("A".to_string()), QueryNode::in_set(["B", "C"])]),
    ];
    for node in raw {
        assert!(matches!(verify_canonical(&node), Err(QueryError::InvariantViolation(_))));
    }
}
