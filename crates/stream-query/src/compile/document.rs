// crates/stream-query/src/compile/document.rs
// ============================================================================
// Module: Document Filter Compiler
// Description: Canonical tree to document-store filter object.
// Purpose: Emit `$in`/`$nin`/`$ne`/`$and`/`$or` filters on the stream ids field.
// Dependencies: serde_json, crate::query
// ============================================================================

//! ## Overview
//! Array fields match document-store style: `{streamIds: "A"}` holds when any
//! tag equals `A`, `{streamIds: {$nin: [..]}}` when no tag is listed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::query::QueryNode;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Field holding an event's stream ids.
pub const STREAM_IDS_FIELD: &str = "streamIds";

/// Output options for [`compile_document_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentFilterOptions {
    /// Emit `{streamIds: v}` instead of `{streamIds: {$in: [v]}}` for
    /// single-element sets.
    pub collapse_singletons: bool,
}

/// Compiles a canonical tree into a document-store filter.
///
/// `None` compiles to a filter that matches no document.
#[must_use]
pub fn compile_document_filter(node: Option<&QueryNode>, options: DocumentFilterOptions) -> Value {
    match node {
        Some(node) => compile(node, options),
        None => json!({ STREAM_IDS_FIELD: { "$in": [] } }),
    }
}

/// Compiles one node.
fn compile(node: &QueryNode, options: DocumentFilterOptions) -> Value {
    match node {
        QueryNode::Equal(id) => json!({ STREAM_IDS_FIELD: id }),
        QueryNode::NotEqual(id) => json!({ STREAM_IDS_FIELD: { "$ne": id } }),
        QueryNode::In(ids) => match ids.first() {
            Some(id) if options.collapse_singletons && ids.len() == 1 => {
                json!({ STREAM_IDS_FIELD: id })
            }
            _ => json!({ STREAM_IDS_FIELD: { "$in": ids } }),
        },
        QueryNode::NotIn(ids) => json!({ STREAM_IDS_FIELD: { "$nin": ids } }),
        QueryNode::And(children) => container("$and", children, options),
        QueryNode::Or(children) => container("$or", children, options),
    }
}

/// Compiles a container; a single child compiles to the child's filter.
fn container(operator: &str, children: &[QueryNode], options: DocumentFilterOptions) -> Value {
    match children {
        [single] => compile(single, options),
        _ => {
            let filters: Vec<Value> = children.iter().map(|child| compile(child, options)).collect();
            json!({ operator: filters })
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::DocumentFilterOptions;
    use super::compile_document_filter;
    use crate::query::QueryNode;

    #[test]
    fn leaves_compile_to_field_filters() {
        let options = DocumentFilterOptions::default();
        let cases = [
            (QueryNode::Equal("A".to_string()), json!({ "streamIds": "A" })),
            (QueryNode::NotEqual("A".to_string()), json!({ "streamIds": { "$ne": "A" } })),
            (QueryNode::in_set(["A", "B"]), json!({ "streamIds": { "$in": ["A", "B"] } })),
            (QueryNode::not_in_set(["A", "B"]), json!({ "streamIds": { "$nin": ["A", "B"] } })),
        ];
        for (node, expected) in cases {
            assert_eq!(compile_document_filter(Some(&node), options), expected);
        }
    }

    #[test]
    fn containers_compile_to_logical_filters() {
        let node = QueryNode::And(vec![
            QueryNode::in_set(["A", "B", "C"]),
            QueryNode::Or(vec![QueryNode::NotEqual("B".to_string())]),
        ]);
        assert_eq!(
            compile_document_filter(Some(&node), DocumentFilterOptions::default()),
            json!({ "$and": [
                { "streamIds": { "$in": ["A", "B", "C"] } },
                { "streamIds": { "$ne": "B" } },
            ] })
        );
    }

    #[test]
    fn singleton_sets_collapse_on_request() {
        let node = QueryNode::in_set(["A"]);
        assert_eq!(
            compile_document_filter(Some(&node), DocumentFilterOptions::default()),
            json!({ "streamIds": { "$in": ["A"] } })
        );
        let options = DocumentFilterOptions {
            collapse_singletons: true,
        };
        assert_eq!(compile_document_filter(Some(&node), options), json!({ "streamIds": "A" }));
    }

    #[test]
    fn nothing_compiles_to_empty_in() {
        assert_eq!(
            compile_document_filter(None, DocumentFilterOptions::default()),
            json!({ "streamIds": { "$in": [] } })
        );
    }
}
