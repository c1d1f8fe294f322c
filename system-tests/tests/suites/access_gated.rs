// system-tests/tests/suites/access_gated.rs
// ============================================================================
// Module: Access-Gated Suite
// Description: Configured deployment resolving queries on behalf of accesses.
// Purpose: Check config wiring, the index cache and gated query resolution.
// Dependencies: stream-access, stream-query, stream-query-config, system-tests
// ============================================================================

//! ## Overview
//! Loads a configuration file, builds the resolver and the access index cache
//! from it and resolves queries for an app access over the reference corpus.

use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::sync::Arc;

use serde_json::json;
use stream_access::Access;
use stream_access::AccessKind;
use stream_access::PermissionLevel;
use stream_access::PermissionRecord;
use stream_access::resolve_for_access;
use stream_query::DocumentFilterOptions;
use stream_query::QueryNode;
use stream_query::StoreId;
use stream_query::compile_document_filter;
use stream_query_config::StreamQueryConfig;
use system_tests::corpus::matches_document_filter;
use system_tests::corpus::reference_events;
use system_tests::corpus::reference_tree;
use system_tests::corpus::select;

/// Result type for this suite.
type SuiteResult = Result<(), Box<dyn Error>>;

/// Loads a deployment config with self-audit enabled and a small cache.
fn load_config() -> Result<StreamQueryConfig, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("stream-query.toml");
    fs::write(
        &path,
        "[access]\naudit_enabled = true\ncache_capacity = 4\n\n[audit_log]\nsink = \"none\"\n",
    )?;
    Ok(StreamQueryConfig::load(Some(&path))?)
}

/// App access `a1` reading the `A` subtree.
fn reader_of_a() -> Arc<Access> {
    Arc::new(Access {
        id: "a1".to_string(),
        token: "token-a1".to_string(),
        user_id: "u1".to_string(),
        kind: AccessKind::App,
        name: "reader".to_string(),
        permissions: Some(vec![PermissionRecord::stream("A", PermissionLevel::Read)]),
    })
}

#[tokio::test]
async fn wildcard_selects_only_readable_events() -> SuiteResult {
    let config = load_config()?;
    let resolver = config.query_resolver()?;
    let cache = config.access_cache()?;
    let permissions = cache.resolver_for(reader_of_a())?;
    let tree = reference_tree();

    let resolved =
        resolve_for_access(&resolver, &json!({ "any": "*" }), &permissions, &tree, &tree).await?;
    let filter = compile_document_filter(
        resolved.for_store(&StoreId::local()).as_ref(),
        DocumentFilterOptions::default(),
    );
    let matched =
        select(&reference_events(), |event| matches_document_filter(&filter, &event.stream_ids));
    let expected: BTreeSet<String> =
        ["a", "ad", "b", "be", "c", "fc"].into_iter().map(ToString::to_string).collect();
    assert_eq!(matched, expected);
    Ok(())
}

#[tokio::test]
async fn self_audit_stream_is_readable_when_enabled() -> SuiteResult {
    let config = load_config()?;
    let resolver = config.query_resolver()?;
    let cache = config.access_cache()?;
    let permissions = cache.resolver_for(reader_of_a())?;
    let tree = reference_tree();

    let resolved = resolve_for_access(
        &resolver,
        &json!([":_audit:access-a1", "D", ".email"]),
        &permissions,
        &tree,
        &tree,
    )
    .await?;
    assert_eq!(
        resolved.for_store(&StoreId::audit()),
        Some(QueryNode::Equal("access-a1".to_string()))
    );
    let dropped: BTreeSet<String> =
        ["D", ":_system:email"].into_iter().map(ToString::to_string).collect();
    assert_eq!(resolved.non_authorized_streams, dropped);
    assert_eq!(resolved.stores(), BTreeSet::from([StoreId::audit()]));
    Ok(())
}

#[tokio::test]
async fn cached_indexes_are_shared_across_requests() -> SuiteResult {
    let config = load_config()?;
    let cache = config.access_cache()?;
    let first = cache.resolver_for(reader_of_a())?.load_permissions();
    let second = cache.resolver_for(reader_of_a())?.load_permissions();
    assert!(Arc::ptr_eq(&first, &second));
    cache.invalidate_access(&reader_of_a())?;
    let rebuilt = cache.resolver_for(reader_of_a())?.load_permissions();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(*first, *rebuilt);
    Ok(())
}
