// crates/stream-query/src/optimize.rs
// ============================================================================
// Module: Stream Query Optimizer
// Description: Canonicalization of expanded query trees.
// Purpose: Splice nested containers, merge membership sets and collapse
//          singletons; verify the canonical post-conditions.
// Dependencies: crate::{error, query}
// ============================================================================

//! ## Overview
//! [`optimize`] is pure, total and idempotent. Under an `OR`, positive leaves
//! (`IN`/`EQUAL`) are merged into one set and negative leaves
//! (`NOTIN`/`NOTEQUAL`) into another; `AND` children are spliced but never
//! merged. `None` means "match nothing" and is pruned from containers.
//!
//! Merging negative leaves under `OR` treats them as one exclusion list, which
//! is exactly the shape the expansion engine produces for `NOT`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::error::QueryResult;
use crate::query::QueryNode;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Optimizes a canonical tree; `None` when it matches nothing.
#[must_use]
pub fn optimize(node: QueryNode) -> Option<QueryNode> {
    match node {
        QueryNode::Equal(_) | QueryNode::NotEqual(_) => Some(node),
        QueryNode::In(ids) => positive(ids),
        QueryNode::NotIn(ids) => negative(ids),
        QueryNode::And(children) => optimize_and(children),
        QueryNode::Or(children) => optimize_or(children),
    }
}

/// Optimizes an optional tree.
#[must_use]
pub fn optimize_option(node: Option<QueryNode>) -> Option<QueryNode> {
    node.and_then(optimize)
}

/// Checks the post-conditions of [`optimize`].
///
/// # Errors
///
/// Returns [`QueryError::InvariantViolation`] naming the first broken rule.
pub fn verify_canonical(node: &QueryNode) -> QueryResult<()> {
    match node {
        QueryNode::Equal(_) | QueryNode::NotEqual(_) => Ok(()),
        QueryNode::In(ids) | QueryNode::NotIn(ids) if ids.len() < 2 => {
            Err(violation("membership set with fewer than two ids", node))
        }
        QueryNode::In(_) | QueryNode::NotIn(_) => Ok(()),
        QueryNode::And(children) | QueryNode::Or(children) if children.len() < 2 => {
            Err(violation("container with fewer than two children", node))
        }
        QueryNode::And(children) => {
            if children.iter().any(|child| matches!(child, QueryNode::And(_))) {
                return Err(violation("AND directly nested in AND", node));
            }
            children.iter().try_for_each(verify_canonical)
        }
        QueryNode::Or(children) => {
            if children.iter().any(|child| matches!(child, QueryNode::Or(_))) {
                return Err(violation("OR directly nested in OR", node));
            }
            let positives = children
                .iter()
                .filter(|child| matches!(child, QueryNode::In(_) | QueryNode::Equal(_)))
                .count();
            let negatives = children
                .iter()
                .filter(|child| matches!(child, QueryNode::NotIn(_) | QueryNode::NotEqual(_)))
                .count();
            if positives > 1 || negatives > 1 {
                return Err(violation("unmerged membership leaves under OR", node));
            }
            children.iter().try_for_each(verify_canonical)
        }
    }
}

// ============================================================================
// SECTION: Containers
// ============================================================================

/// Optimizes an `AND`: splice nested `AND`s and prune `None`.
fn optimize_and(children: Vec<QueryNode>) -> Option<QueryNode> {
    let mut kept = Vec::with_capacity(children.len());
    for child in children.into_iter().filter_map(optimize) {
        match child {
            QueryNode::And(grandchildren) => kept.extend(grandchildren),
            other => kept.push(other),
        }
    }
    collapse(kept, QueryNode::And)
}

/// Optimizes an `OR`: splice nested `OR`s and merge membership leaves.
fn optimize_or(children: Vec<QueryNode>) -> Option<QueryNode> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children.into_iter().filter_map(optimize) {
        match child {
            QueryNode::Or(grandchildren) => flat.extend(grandchildren),
            other => flat.push(other),
        }
    }

    let mut included = BTreeSet::new();
    let mut excluded = BTreeSet::new();
    let mut others = Vec::new();
    for child in flat {
        match child {
            QueryNode::Equal(id) => {
                included.insert(id);
            }
            QueryNode::In(ids) => included.extend(ids),
            QueryNode::NotEqual(id) => {
                excluded.insert(id);
            }
            QueryNode::NotIn(ids) => excluded.extend(ids),
            other => others.push(other),
        }
    }

    let mut kept = Vec::with_capacity(others.len() + 2);
    kept.extend(positive(included));
    kept.extend(negative(excluded));
    kept.extend(others);
    collapse(kept, QueryNode::Or)
}

/// Collapses a container with zero or one children.
fn collapse(mut children: Vec<QueryNode>, build: fn(Vec<QueryNode>) -> QueryNode) -> Option<QueryNode> {
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(build(children)),
    }
}

// ============================================================================
// SECTION: Leaves
// ============================================================================

/// Normalizes a positive set: empty to `None`, singleton to `EQUAL`.
fn positive(mut ids: BTreeSet<String>) -> Option<QueryNode> {
    match ids.len() {
        0 => None,
        1 => ids.pop_first().map(QueryNode::Equal),
        _ => Some(QueryNode::In(ids)),
    }
}

/// Normalizes a negative set: empty to `None`, singleton to `NOTEQUAL`.
fn negative(mut ids: BTreeSet<String>) -> Option<QueryNode> {
    match ids.len() {
        0 => None,
        1 => ids.pop_first().map(QueryNode::NotEqual),
        _ => Some(QueryNode::NotIn(ids)),
    }
}

/// Builds an invariant violation naming the offending node.
fn violation(rule: &str, node: &QueryNode) -> QueryError {
    QueryError::InvariantViolation(format!("{rule}: {node}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
