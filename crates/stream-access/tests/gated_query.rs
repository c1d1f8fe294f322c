// crates/stream-access/tests/gated_query.rs
// ============================================================================
// Module: Access-Gated Query Tests
// Description: Stream queries resolved on behalf of an access.
// Purpose: Check that callers only see streams they may read.
// ============================================================================

//! ## Overview
//! Runs `resolve_for_access` over the reference tree with app and personal
//! accesses, covering dropped identifiers, filtered expansions, wildcards and
//! collaborator failures.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use stream_access::AccessError;
use stream_access::AccessKind;
use stream_access::AccessPolicy;
use stream_access::AccessQueryError;
use stream_access::PermissionLevel;
use stream_access::PermissionRecord;
use stream_access::PermissionResolver;
use stream_access::StreamHierarchy;
use stream_access::resolve_for_access;
use stream_query::ErrorClass;
use stream_query::QueryNode;
use stream_query::ResolvedQuery;
use stream_query::StoreId;
use stream_query::StreamQueryResolver;
use support::TestResult;
use support::access;
use support::ensure;
use support::reference_tree;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves a query for an access of the given kind over the reference tree.
async fn resolve(
    kind: AccessKind,
    records: Vec<PermissionRecord>,
    raw: Value,
) -> Result<ResolvedQuery, AccessQueryError> {
    let tree = reference_tree();
    let permissions = PermissionResolver::new(access(kind, records), AccessPolicy::default());
    resolve_for_access(&StreamQueryResolver::default(), &raw, &permissions, &tree, &tree).await
}

/// Grants read on `A` and create-only on `C`.
fn read_a_create_c() -> Vec<PermissionRecord> {
    vec![
        PermissionRecord::stream("A", PermissionLevel::Read),
        PermissionRecord::stream("C", PermissionLevel::CreateOnly),
    ]
}

/// Hierarchy whose backend is unavailable.
struct UnavailableHierarchy;

#[async_trait]
impl StreamHierarchy for UnavailableHierarchy {
    async fn parent_of(&self, _store: &StoreId, _stream: &str) -> Result<Option<String>, AccessError> {
        Err(AccessError::Hierarchy("backend unavailable".to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn unreadable_identifiers_are_reported() -> TestResult {
    let resolved = resolve(AccessKind::App, read_a_create_c(), json!(["A", "D"])).await?;
    ensure(
        resolved.non_authorized_streams == BTreeSet::from(["D".to_string()]),
        format!("unexpected non-authorized set {:?}", resolved.non_authorized_streams),
    )?;
    ensure(
        resolved.query == Some(QueryNode::in_set(["A", "B"])),
        format!("unexpected tree {:?}", resolved.query),
    )
}

#[tokio::test]
async fn expansions_drop_unreadable_descendants() -> TestResult {
    let resolved = resolve(AccessKind::App, read_a_create_c(), json!({ "EXPAND": "A" })).await?;
    ensure(
        resolved.query == Some(QueryNode::in_set(["A", "B"])),
        "create-only C must not be readable through A",
    )?;
    let direct = resolve(AccessKind::App, read_a_create_c(), json!({ "EQUAL": "C" })).await?;
    ensure(direct.query.is_none(), "direct create-only reference matches nothing")?;
    ensure(direct.non_authorized_streams.contains("C"), "C is reported")
}

#[tokio::test]
async fn wildcard_means_every_readable_stream() -> TestResult {
    let scoped = resolve(AccessKind::App, read_a_create_c(), json!({ "any": "*" })).await?;
    ensure(
        scoped.query == Some(QueryNode::in_set(["A", "B"])),
        format!("unexpected app wildcard {:?}", scoped.query),
    )?;
    let personal = resolve(AccessKind::Personal, Vec::new(), json!({ "any": "*" })).await?;
    ensure(
        personal.query == Some(QueryNode::in_set(["A", "B", "C", "D", "E", "F"])),
        format!("unexpected personal wildcard {:?}", personal.query),
    )
}

#[tokio::test]
async fn query_errors_pass_through() -> TestResult {
    let outcome = resolve(AccessKind::App, read_a_create_c(), json!(":nowhere:A")).await;
    ensure(
        matches!(&outcome, Err(AccessQueryError::Query(err))
            if err.class() == ErrorClass::UnknownReferencedResource),
        format!("expected an unknown reference, got {outcome:?}"),
    )
}

#[tokio::test]
async fn hierarchy_failures_surface_as_access_errors() -> TestResult {
    let tree = reference_tree();
    let permissions =
        PermissionResolver::new(access(AccessKind::App, Vec::new()), AccessPolicy::default());
    let outcome = resolve_for_access(
        &StreamQueryResolver::default(),
        &json!("B"),
        &permissions,
        &tree,
        &UnavailableHierarchy,
    )
    .await;
    ensure(
        matches!(outcome, Err(AccessQueryError::Access(AccessError::Hierarchy(_)))),
        format!("expected a hierarchy failure, got {outcome:?}"),
    )
}
