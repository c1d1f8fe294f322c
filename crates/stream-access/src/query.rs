// crates/stream-access/src/query.rs
// ============================================================================
// Module: Access-Gated Queries
// Description: Bridges the permission resolver into stream query resolution.
// Purpose: Resolve queries so callers only see streams they may read.
// Dependencies: async-trait, futures, serde_json, stream-query,
//              crate::{error, hierarchy, resolver}
// ============================================================================

//! ## Overview
//! The query validator is synchronous while permission levels need async
//! parent walks. [`QueryAuthorizer`] therefore resolves every identifier of a
//! prepared query up front, concurrently, and answers from that table.
//!
//! Wildcards are admitted by the authorizer and narrowed by
//! [`AccessScopedExpander`], which keeps only readable streams from each
//! expansion. A wildcard thus denotes every stream the access may read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use stream_query::ExpansionError;
use stream_query::ResolvedQuery;
use stream_query::StoreId;
use stream_query::StreamAuthorizer;
use stream_query::StreamExpander;
use stream_query::StreamQueryResolver;
use stream_query::StreamRef;

use crate::error::AccessError;
use crate::error::AccessQueryError;
use crate::hierarchy::StreamHierarchy;
use crate::level::PermissionLevel;
use crate::resolver::PermissionResolver;

// ============================================================================
// SECTION: Authorizer
// ============================================================================

/// Synchronous authorizer over pre-resolved read permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAuthorizer {
    /// Read permission per stream.
    readable: BTreeMap<StreamRef, bool>,
}

impl QueryAuthorizer {
    /// Resolves read permission for every stream concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when a parent walk fails.
    pub async fn prepare<H>(
        permissions: &PermissionResolver,
        streams: impl IntoIterator<Item = StreamRef>,
        hierarchy: &H,
    ) -> Result<Self, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        let streams: Vec<StreamRef> =
            streams.into_iter().filter(|stream| !stream.is_wildcard()).collect();
        let answers = try_join_all(streams.iter().map(|stream| {
            permissions.can_get_events_on_stream(&stream.store, &stream.stream, hierarchy)
        }))
        .await?;
        Ok(Self {
            readable: streams.into_iter().zip(answers).collect(),
        })
    }
}

impl StreamAuthorizer for QueryAuthorizer {
    fn is_authorized(&self, stream: &StreamRef) -> bool {
        stream.is_wildcard() || self.readable.get(stream).copied().unwrap_or(false)
    }
}

// ============================================================================
// SECTION: Expander
// ============================================================================

/// Expander that drops streams the access may not read.
pub struct AccessScopedExpander<'a, E: ?Sized, H: ?Sized> {
    /// Expander over the whole store.
    inner: &'a E,
    /// Permission oracle.
    permissions: &'a PermissionResolver,
    /// Parent lookup for inheritance.
    hierarchy: &'a H,
}

impl<'a, E: ?Sized, H: ?Sized> AccessScopedExpander<'a, E, H> {
    /// Wraps an expander.
    #[must_use]
    pub const fn new(inner: &'a E, permissions: &'a PermissionResolver, hierarchy: &'a H) -> Self {
        Self {
            inner,
            permissions,
            hierarchy,
        }
    }
}

#[async_trait]
impl<'a, E, H> StreamExpander for AccessScopedExpander<'a, E, H>
where
    E: StreamExpander + ?Sized,
    H: StreamHierarchy + ?Sized,
{
    async fn expand_one(
        &self,
        store: &StoreId,
        stream_id: &str,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<String>, ExpansionError> {
        let streams = self.inner.expand_one(store, stream_id, excluded).await?;
        let levels = try_join_all(
            streams.iter().map(|stream| self.permissions.level_for(store, stream, self.hierarchy)),
        )
        .await
        .map_err(|err| ExpansionError::Backend(err.to_string()))?;
        Ok(streams
            .into_iter()
            .zip(levels)
            .filter(|(_, level)| level.is_some_and(PermissionLevel::can_read))
            .map(|(stream, _)| stream)
            .collect())
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Resolves a raw query on behalf of an access.
///
/// Identifiers the access may not read are dropped and reported in
/// [`ResolvedQuery::non_authorized_streams`]; expansions only yield readable
/// streams.
///
/// # Errors
///
/// Returns [`AccessQueryError::Query`] for rejected queries and
/// [`AccessQueryError::Access`] when permissions cannot be resolved.
pub async fn resolve_for_access<E, H>(
    resolver: &StreamQueryResolver,
    raw: &Value,
    permissions: &PermissionResolver,
    expander: &E,
    hierarchy: &H,
) -> Result<ResolvedQuery, AccessQueryError>
where
    E: StreamExpander + ?Sized,
    H: StreamHierarchy + ?Sized,
{
    let prepared = resolver.prepare(raw)?;
    let authorizer = QueryAuthorizer::prepare(permissions, prepared.stream_refs(), hierarchy).await?;
    let scoped = AccessScopedExpander::new(expander, permissions, hierarchy);
    Ok(resolver.complete(prepared, &scoped, &authorizer).await?)
}
