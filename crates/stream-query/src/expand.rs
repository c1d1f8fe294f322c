// crates/stream-query/src/expand.rs
// ============================================================================
// Module: Stream Query Expansion
// Description: Replaces expansion operators with descendant closures.
// Purpose: Collect every distinct expansion request, issue them concurrently,
//          then fold the validated tree into canonical `QueryNode`s.
// Dependencies: futures, crate::{error, identifiers, interfaces, query}
// ============================================================================

//! ## Overview
//! Expansion runs in two phases. Phase one walks the validated tree and
//! collects every distinct `(stream, exclusion set)` request; the requests are
//! issued to the [`StreamExpander`] concurrently. Phase two folds the tree
//! synchronously using the collected closures:
//!
//! - `EXPAND(id)` becomes `IN(closure)`,
//! - `NOTEXPAND(id)` becomes `NOTIN(closure)`,
//! - `NOT(ids)` becomes `OR` of one `NOTIN(closure)` per id.
//!
//! Empty closures drop their clause. Exclusions only apply within the store of
//! the stream being expanded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use futures::future::try_join_all;

use crate::error::QueryError;
use crate::error::QueryResult;
use crate::identifiers::StreamRef;
use crate::interfaces::StreamExpander;
use crate::query::Expr;
use crate::query::QueryNode;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One distinct call to the expansion oracle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ExpansionRequest {
    /// Stream to expand.
    stream: StreamRef,
    /// Store-local ids skipped during expansion.
    excluded: BTreeSet<String>,
}

impl ExpansionRequest {
    /// Builds a request, keeping only exclusions of the stream's store.
    fn new(stream: &StreamRef, excluded: &[StreamRef]) -> Self {
        Self {
            stream: stream.clone(),
            excluded: excluded
                .iter()
                .filter(|candidate| candidate.store == stream.store)
                .map(|candidate| candidate.stream.clone())
                .collect(),
        }
    }
}

/// Closures keyed by request, qualified for the canonical tree.
type Closures = BTreeMap<ExpansionRequest, BTreeSet<String>>;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Expands a validated tree into its canonical form.
///
/// Returns `Ok(None)` when every clause expands to nothing.
///
/// # Errors
///
/// Returns [`QueryError::Expansion`] when the oracle fails.
pub async fn expand<E>(expr: Expr<StreamRef>, expander: &E) -> QueryResult<Option<QueryNode>>
where
    E: StreamExpander + ?Sized,
{
    let mut requests = BTreeSet::new();
    collect_requests(&expr, &mut requests);

    let lookups = requests.into_iter().map(|request| async move {
        let closure = expander
            .expand_one(&request.stream.store, &request.stream.stream, &request.excluded)
            .await
            .map_err(|err| QueryError::Expansion(err.to_string()))?;
        let qualified = closure
            .into_iter()
            .map(|stream| StreamRef::new(request.stream.store.clone(), stream).qualified())
            .collect::<BTreeSet<_>>();
        Ok::<_, QueryError>((request, qualified))
    });
    let closures: Closures = try_join_all(lookups).await?.into_iter().collect();

    Ok(fold(expr, &closures))
}

// ============================================================================
// SECTION: Phase One
// ============================================================================

/// Collects the distinct expansion requests of a tree.
fn collect_requests(expr: &Expr<StreamRef>, requests: &mut BTreeSet<ExpansionRequest>) {
    match expr {
        Expr::Expand {
            id,
            excluded,
        }
        | Expr::NotExpand {
            id,
            excluded,
        } => {
            requests.insert(ExpansionRequest::new(id, excluded));
        }
        Expr::Not {
            ids,
            excluded,
        } => {
            requests.extend(ids.iter().map(|id| ExpansionRequest::new(id, excluded)));
        }
        Expr::And(children) | Expr::Or(children) => {
            for child in children {
                collect_requests(child, requests);
            }
        }
        Expr::Equal(_) | Expr::NotEqual(_) | Expr::In(_) | Expr::NotIn(_) => {}
    }
}

// ============================================================================
// SECTION: Phase Two
// ============================================================================

/// Folds a validated tree using pre-fetched closures.
fn fold(expr: Expr<StreamRef>, closures: &Closures) -> Option<QueryNode> {
    match expr {
        Expr::Equal(id) => Some(QueryNode::Equal(id.qualified())),
        Expr::NotEqual(id) => Some(QueryNode::NotEqual(id.qualified())),
        Expr::In(ids) => non_empty(qualify(&ids)).map(QueryNode::In),
        Expr::NotIn(ids) => non_empty(qualify(&ids)).map(QueryNode::NotIn),
        Expr::Expand {
            id,
            excluded,
        } => closure(closures, &id, &excluded).map(QueryNode::In),
        Expr::NotExpand {
            id,
            excluded,
        } => closure(closures, &id, &excluded).map(QueryNode::NotIn),
        Expr::Not {
            ids,
            excluded,
        } => {
            let negations: Vec<QueryNode> = ids
                .iter()
                .filter_map(|id| closure(closures, id, &excluded).map(QueryNode::NotIn))
                .collect();
            wrap(negations, QueryNode::Or)
        }
        Expr::And(children) => {
            let folded = children.into_iter().filter_map(|child| fold(*child, closures)).collect();
            wrap(folded, QueryNode::And)
        }
        Expr::Or(children) => {
            let folded = children.into_iter().filter_map(|child| fold(*child, closures)).collect();
            wrap(folded, QueryNode::Or)
        }
    }
}

/// Looks up the closure of a stream, `None` when empty.
fn closure(closures: &Closures, id: &StreamRef, excluded: &[StreamRef]) -> Option<BTreeSet<String>> {
    closures.get(&ExpansionRequest::new(id, excluded)).cloned().and_then(non_empty)
}

/// Renders references as qualified identifiers.
fn qualify(ids: &[StreamRef]) -> BTreeSet<String> {
    ids.iter().map(StreamRef::qualified).collect()
}

/// Returns `None` for an empty set.
fn non_empty(set: BTreeSet<String>) -> Option<BTreeSet<String>> {
    if set.is_empty() { None } else { Some(set) }
}

/// Wraps children in a container, `None` when no child survived.
fn wrap(children: Vec<QueryNode>, build: fn(Vec<QueryNode>) -> QueryNode) -> Option<QueryNode> {
    if children.is_empty() { None } else { Some(build(children)) }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
