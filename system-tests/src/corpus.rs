// system-tests/src/corpus.rs
// ============================================================================
// Module: Reference Corpus
// Description: Reference stream tree, events and document filter evaluation.
// Purpose: Give every suite the same data and an independent filter oracle.
// Dependencies: serde_json, stream-query
// ============================================================================

//! ## Overview
//! The reference tree is `A -> {B, C}` and `D -> {E, F}` in the local store,
//! plus one audit stream and one account stream. Events carry one or two
//! stream ids. [`matches_document_filter`] evaluates the document-store filter
//! grammar emitted by `stream-query` over an event's stream ids, so compiled
//! filters can be checked without a document database. Unsupported operators
//! match nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stream_query::InMemoryStreamTree;
use stream_query::STREAM_IDS_FIELD;
use stream_query::StoreId;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event with its stream ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event identifier.
    pub id: String,
    /// Store-local stream ids the event belongs to.
    pub stream_ids: Vec<String>,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(id: &str, stream_ids: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            stream_ids: stream_ids.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Builds the reference stream tree.
#[must_use]
pub fn reference_tree() -> InMemoryStreamTree {
    let local = StoreId::local();
    InMemoryStreamTree::new()
        .with_stream(&local, "A", None)
        .with_stream(&local, "B", Some("A"))
        .with_stream(&local, "C", Some("A"))
        .with_stream(&local, "D", None)
        .with_stream(&local, "E", Some("D"))
        .with_stream(&local, "F", Some("D"))
        .with_stream(&StoreId::audit(), "access-a1", None)
        .with_stream(&StoreId::system(), "email", None)
}

/// Builds the local-store reference events.
#[must_use]
pub fn reference_events() -> Vec<Event> {
    vec![
        Event::new("ad", &["A", "D"]),
        Event::new("be", &["B", "E"]),
        Event::new("fc", &["F", "C"]),
        Event::new("a", &["A"]),
        Event::new("b", &["B"]),
        Event::new("c", &["C"]),
        Event::new("d", &["D"]),
        Event::new("e", &["E"]),
        Event::new("f", &["F"]),
    ]
}

/// Raw queries whose compiled filters must agree with in-memory evaluation.
///
/// Every query keeps at least one positive clause, so it also compiles to a
/// full-text expression.
#[must_use]
pub fn agreement_queries() -> Vec<Value> {
    vec![
        json!("A"),
        json!(["A", "D"]),
        json!({ "AND": ["A", { "NOT": ["B"] }] }),
        json!({ "any": ["A"], "not": ["B"] }),
        json!({ "any": ["D"], "not": ["E"] }),
        json!({ "all": ["A", "D"] }),
        json!({ "OR": [{ "EQUAL": "E" }, { "IN": ["B", "C"] }] }),
        json!({ "AND": [{ "IN": ["A", "B", "D"] }, { "NOTIN": ["D"] }] }),
        json!({ "any": "*" }),
    ]
}

/// Returns the ids of the events satisfying `predicate`.
pub fn select<F>(events: &[Event], predicate: F) -> BTreeSet<String>
where
    F: Fn(&Event) -> bool,
{
    events.iter().filter(|event| predicate(event)).map(|event| event.id.clone()).collect()
}

// ============================================================================
// SECTION: Document Filters
// ============================================================================

/// Evaluates a document-store filter over an event's stream ids.
#[must_use]
pub fn matches_document_filter(filter: &Value, stream_ids: &[String]) -> bool {
    let Some(object) = filter.as_object() else {
        return false;
    };
    object.iter().all(|(key, operand)| match key.as_str() {
        "$and" => each(operand).is_some_and(|mut parts| {
            parts.all(|part| matches_document_filter(part, stream_ids))
        }),
        "$or" => each(operand).is_some_and(|mut parts| {
            parts.any(|part| matches_document_filter(part, stream_ids))
        }),
        STREAM_IDS_FIELD => matches_field(operand, stream_ids),
        _ => false,
    })
}

/// Iterates over an array operand.
fn each(operand: &Value) -> Option<std::slice::Iter<'_, Value>> {
    operand.as_array().map(|items| items.iter())
}

/// Evaluates the condition on the stream ids field.
fn matches_field(condition: &Value, stream_ids: &[String]) -> bool {
    match condition {
        Value::String(id) => contains(stream_ids, id),
        Value::Object(operators) => operators_hold(operators, stream_ids),
        _ => false,
    }
}

/// Evaluates `$in`, `$nin` and `$ne` with array-field semantics.
fn operators_hold(operators: &Map<String, Value>, stream_ids: &[String]) -> bool {
    operators.iter().all(|(operator, operand)| match (operator.as_str(), operand) {
        ("$in", Value::Array(ids)) => {
            ids.iter().any(|id| id.as_str().is_some_and(|id| contains(stream_ids, id)))
        }
        ("$nin", Value::Array(ids)) => {
            ids.iter().all(|id| id.as_str().is_some_and(|id| !contains(stream_ids, id)))
        }
        ("$ne", Value::String(id)) => !contains(stream_ids, id),
        _ => false,
    })
}

/// Returns true when the event carries the stream id.
fn contains(stream_ids: &[String], id: &str) -> bool {
    stream_ids.iter().any(|stream| stream == id)
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

    use super::matches_document_filter;

    #[test]
    fn evaluator_uses_array_field_semantics() {
        let ids = vec!["A".to_string(), "D".to_string()];
        assert!(matches_document_filter(&json!({ "streamIds": "D" }), &ids));
        assert!(matches_document_filter(&json!({ "streamIds": { "$in": ["B", "A"] } }), &ids));
        assert!(!matches_document_filter(&json!({ "streamIds": { "$nin": ["D"] } }), &ids));
        assert!(!matches_document_filter(&json!({ "streamIds": { "$ne": "A" } }), &ids));
        assert!(!matches_document_filter(&json!({ "streamIds": { "$in": [] } }), &ids));
        assert!(!matches_document_filter(&json!({ "$where": "1" }), &ids));
    }
}
