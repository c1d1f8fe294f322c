// system-tests/tests/suites/document_filters.rs
// ============================================================================
// Module: Document Filter Suite
// Description: Compiled document filters evaluated over the reference corpus.
// Purpose: Check that document filters select what the canonical tree matches.
// Dependencies: stream-query, system-tests
// ============================================================================

//! ## Overview
//! Resolves every agreement query, compiles the local-store view to a
//! document filter and evaluates it over the reference events.

use std::collections::BTreeSet;

use serde_json::Value;
use serde_json::json;
use stream_query::AllowAll;
use stream_query::DocumentFilterOptions;
use stream_query::QueryError;
use stream_query::ResolvedQuery;
use stream_query::StoreId;
use stream_query::StreamQueryResolver;
use stream_query::StreamRef;
use stream_query::compile_document_filter;
use system_tests::corpus::agreement_queries;
use system_tests::corpus::matches_document_filter;
use system_tests::corpus::reference_events;
use system_tests::corpus::reference_tree;
use system_tests::corpus::select;

/// Resolves a raw query over the reference tree with every stream readable.
async fn resolve(raw: &Value) -> Result<ResolvedQuery, QueryError> {
    StreamQueryResolver::default().resolve(raw, &reference_tree(), &AllowAll).await
}

#[tokio::test]
async fn document_filters_agree_with_tree_evaluation() -> Result<(), QueryError> {
    let events = reference_events();
    for raw in agreement_queries() {
        let local = resolve(&raw).await?.for_store(&StoreId::local());
        for options in [
            DocumentFilterOptions::default(),
            DocumentFilterOptions {
                collapse_singletons: true,
            },
        ] {
            let filter = compile_document_filter(local.as_ref(), options);
            let expected = select(&events, |event| {
                local.as_ref().is_some_and(|node| node.matches(&event.stream_ids))
            });
            let actual =
                select(&events, |event| matches_document_filter(&filter, &event.stream_ids));
            assert_eq!(actual, expected, "query {raw} compiled to {filter}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn and_not_selects_the_reference_events() -> Result<(), QueryError> {
    let resolved = resolve(&json!({ "AND": ["A", { "NOT": ["B"] }] })).await?;
    let filter = compile_document_filter(
        resolved.for_store(&StoreId::local()).as_ref(),
        DocumentFilterOptions::default(),
    );
    let matched =
        select(&reference_events(), |event| matches_document_filter(&filter, &event.stream_ids));
    let expected: BTreeSet<String> =
        ["a", "ad", "c", "fc"].into_iter().map(ToString::to_string).collect();
    assert_eq!(matched, expected);
    Ok(())
}

#[tokio::test]
async fn unauthorized_queries_select_nothing() -> Result<(), QueryError> {
    let tree = reference_tree();
    let nothing = |_: &StreamRef| false;
    let resolved =
        StreamQueryResolver::default().resolve(&json!(["A", "D"]), &tree, &nothing).await?;
    assert_eq!(resolved.non_authorized_streams.len(), 2);
    let filter = compile_document_filter(resolved.query.as_ref(), DocumentFilterOptions::default());
    let matched =
        select(&reference_events(), |event| matches_document_filter(&filter, &event.stream_ids));
    assert!(matched.is_empty(), "match-nothing filter selected {matched:?}");
    Ok(())
}
