// system-tests/tests/suites/fulltext_sqlite.rs
// ============================================================================
// Module: Full-Text SQLite Suite
// Description: Compiled FTS5 expressions executed against SQLite.
// Purpose: Check that full-text filters select what the canonical tree matches.
// Dependencies: rusqlite, stream-query, system-tests
// ============================================================================

//! ## Overview
//! Loads the reference events into an in-memory FTS5 table and executes the
//! MATCH expression compiled from every agreement query.

use std::collections::BTreeSet;
use std::error::Error;

use serde_json::json;
use stream_query::AllowAll;
use stream_query::FullTextFilter;
use stream_query::QueryError;
use stream_query::QueryNode;
use stream_query::StoreId;
use stream_query::StreamQueryResolver;
use stream_query::compile_fulltext;
use system_tests::corpus::Event;
use system_tests::corpus::agreement_queries;
use system_tests::corpus::reference_events;
use system_tests::corpus::reference_tree;
use system_tests::corpus::select;
use system_tests::fts::FtsEventIndex;

/// Result type for this suite.
type SuiteResult = Result<(), Box<dyn Error>>;

/// Compiles an equality on `id` and returns the matching event ids.
fn matching_id(index: &FtsEventIndex, id: &str) -> Result<BTreeSet<String>, Box<dyn Error>> {
    let filter = compile_fulltext(Some(&QueryNode::Equal(id.to_string())))?;
    Ok(index.matching(&filter)?)
}

#[tokio::test]
async fn fulltext_filters_agree_with_tree_evaluation() -> SuiteResult {
    let events = reference_events();
    let index = FtsEventIndex::with_events(&events)?;
    let resolver = StreamQueryResolver::default();
    let tree = reference_tree();
    for raw in agreement_queries() {
        let local = resolver.resolve(&raw, &tree, &AllowAll).await?.for_store(&StoreId::local());
        let filter = compile_fulltext(local.as_ref())?;
        let expected = select(&events, |event| {
            local.as_ref().is_some_and(|node| node.matches(&event.stream_ids))
        });
        let actual = index.matching(&filter)?;
        assert_eq!(actual, expected, "query {raw} compiled to {filter:?}");
    }
    Ok(())
}

#[tokio::test]
async fn lone_negation_is_rejected_for_fulltext() -> SuiteResult {
    let resolved = StreamQueryResolver::default()
        .resolve(&json!({ "NOT": ["A"] }), &reference_tree(), &AllowAll)
        .await?;
    let outcome = compile_fulltext(resolved.for_store(&StoreId::local()).as_ref());
    assert!(matches!(outcome, Err(QueryError::MalformedQuery { .. })), "got {outcome:?}");
    Ok(())
}

#[test]
fn match_nothing_and_unrestricted_clauses_execute() -> SuiteResult {
    let events = reference_events();
    let index = FtsEventIndex::with_events(&events)?;
    assert!(index.matching(&FullTextFilter::MatchNothing)?.is_empty());
    assert_eq!(index.matching(&FullTextFilter::Unrestricted)?.len(), events.len());
    Ok(())
}

#[test]
fn punctuated_ids_are_single_tokens() -> SuiteResult {
    let index = FtsEventIndex::with_events(&[
        Event::new("audit", &[":_audit:access-a1"]),
        Event::new("other", &[":_audit:access-a2", "work.notes"]),
        Event::new("accented", &["café"]),
        Event::new("plain", &["cafe"]),
    ])?;
    assert_eq!(matching_id(&index, ":_audit:access-a1")?, BTreeSet::from(["audit".to_string()]));
    assert_eq!(matching_id(&index, "work.notes")?, BTreeSet::from(["other".to_string()]));
    assert_eq!(matching_id(&index, "café")?, BTreeSet::from(["accented".to_string()]));
    assert_eq!(matching_id(&index, "cafe")?, BTreeSet::from(["plain".to_string()]));
    Ok(())
}

#[test]
fn ids_the_tokenizer_would_split_are_rejected() -> SuiteResult {
    let index = FtsEventIndex::with_events(&[
        Event::new("joined", &["a+b"]),
        Event::new("adjacent", &["a", "b"]),
    ])?;
    let outcome = compile_fulltext(Some(&QueryNode::Equal("a+b".to_string())));
    assert!(matches!(outcome, Err(QueryError::MalformedQuery { .. })), "got {outcome:?}");
    let spread = index.matching(&FullTextFilter::Match("\"a+b\"".to_string()))?;
    assert_eq!(spread.len(), 2, "a multi-token phrase also matches adjacent ids");
    Ok(())
}
