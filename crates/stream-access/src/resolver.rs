// crates/stream-access/src/resolver.rs
// ============================================================================
// Module: Permission Resolver
// Description: Per-access permission oracle with lazy indexing.
// Purpose: Resolve effective levels on streams and tags for one access.
// Dependencies: stream-query, crate::{access, error, hierarchy, index, level}
// ============================================================================

//! ## Overview
//! A [`PermissionResolver`] starts uninitialized and builds its
//! [`AccessPermissionIndex`] on first use (or eagerly via
//! [`PermissionResolver::load_permissions`]). Building is idempotent and the
//! published index is shared immutably.
//!
//! Stream levels are inherited: the first explicit grant found walking from
//! the stream to its root wins. Without one, account streams (`_system`) are
//! denied and every other store falls back to its `*` grant. Personal
//! accesses manage everything.
//!
//! Security posture: the resolver fails closed. A missing grant answers
//! `None`, and hierarchy faults surface as [`AccessError`] rather than as a
//! permissive default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::OnceLock;

use serde_json::Value;
use stream_query::AccessAuditEvent;
use stream_query::AccessAuditEventParams;
use stream_query::NoopAuditSink;
use stream_query::QueryAuditSink;
use stream_query::StoreId;
use stream_query::WILDCARD;

use crate::access::Access;
use crate::access::AccessPolicy;
use crate::access::FEATURE_SELF_AUDIT;
use crate::access::PermissionRecord;
use crate::access::SETTING_FORBIDDEN;
use crate::error::AccessError;
use crate::hierarchy::StreamHierarchy;
use crate::index::AccessPermissionIndex;
use crate::level::PermissionLevel;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Permission oracle for one access.
#[derive(Clone)]
pub struct PermissionResolver {
    /// Access being resolved.
    access: Arc<Access>,
    /// Deployment policy.
    policy: AccessPolicy,
    /// Lazily built permission index.
    index: OnceLock<Arc<AccessPermissionIndex>>,
    /// Sink receiving index build events.
    audit: Arc<dyn QueryAuditSink>,
}

impl PermissionResolver {
    /// Creates an uninitialized resolver.
    #[must_use]
    pub fn new(access: Arc<Access>, policy: AccessPolicy) -> Self {
        Self {
            access,
            policy,
            index: OnceLock::new(),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Creates a resolver around an already published index.
    #[must_use]
    pub fn with_index(
        access: Arc<Access>,
        policy: AccessPolicy,
        index: Arc<AccessPermissionIndex>,
    ) -> Self {
        let resolver = Self::new(access, policy);
        let _ = resolver.index.set(index);
        resolver
    }

    /// Routes index build events to the given sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn QueryAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the access being resolved.
    #[must_use]
    pub fn access(&self) -> &Access {
        &self.access
    }

    /// Builds the permission index once and returns it.
    pub fn load_permissions(&self) -> Arc<AccessPermissionIndex> {
        Arc::clone(self.index())
    }

    /// Returns the index, building it on first use.
    fn index(&self) -> &Arc<AccessPermissionIndex> {
        self.index.get_or_init(|| Arc::new(self.build_index()))
    }

    /// Indexes the access's records plus the implicit self-audit grant.
    fn build_index(&self) -> AccessPermissionIndex {
        let mut records = self.access.permissions.clone().unwrap_or_default();
        let self_audit_granted = self.policy.audit_enabled
            && !self.access.is_personal()
            && !self.access.forbids_feature(FEATURE_SELF_AUDIT);
        if self_audit_granted {
            records.push(PermissionRecord::stream(
                self.access.audit_stream_id(),
                PermissionLevel::Read,
            ));
        }
        let index = AccessPermissionIndex::build(&records);
        self.audit.record_access(&AccessAuditEvent::new(AccessAuditEventParams {
            access_id: self.access.id.clone(),
            access_kind: self.access.kind.label(),
            stream_permissions: index.stream_count(),
            tag_permissions: index.tag_count(),
            feature_permissions: index.feature_count(),
            self_audit_granted,
        }));
        index
    }

    // ------------------------------------------------------------------------
    // Levels
    // ------------------------------------------------------------------------

    /// Resolves the effective level on a stream.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when a parent lookup fails or the
    /// parent chain loops.
    pub async fn level_for<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<Option<PermissionLevel>, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        if self.access.is_personal() {
            return Ok(Some(PermissionLevel::Manage));
        }
        let index = self.index();
        let mut visited = BTreeSet::new();
        let mut current = Some(stream.to_string());
        while let Some(id) = current {
            if let Some(level) = index.stream_level(store, &id) {
                return Ok(Some(level));
            }
            if !visited.insert(id.clone()) {
                return Err(AccessError::Hierarchy(format!(
                    "parent chain of `{stream}` in store `{store}` loops at `{id}`"
                )));
            }
            current = hierarchy.parent_of(store, &id).await?;
        }
        if store.is_account() {
            return Ok(None);
        }
        Ok(index.store_wildcard_level(store))
    }

    /// Resolves the effective level on a tag, falling back to the `*` tag.
    #[must_use]
    pub fn tag_level_for(&self, tag: &str) -> Option<PermissionLevel> {
        if self.access.is_personal() {
            return Some(PermissionLevel::Manage);
        }
        let index = self.index();
        index.tag_level(tag).or_else(|| index.tag_level(WILDCARD))
    }

    // ------------------------------------------------------------------------
    // Derived checks
    // ------------------------------------------------------------------------

    /// Returns true when events of the stream may be read.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_get_events_on_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        Ok(self.level_for(store, stream, hierarchy).await?.is_some_and(PermissionLevel::can_read))
    }

    /// Returns true when the stream is visible at all.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_list_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        Ok(self.level_for(store, stream, hierarchy).await?.is_some())
    }

    /// Returns true when events may be created in the stream.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_create_events_on_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        Ok(self.level_for(store, stream, hierarchy).await?.is_some_and(PermissionLevel::can_create))
    }

    /// Returns true when events of the stream may be updated.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_update_events_on_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        Ok(self.level_for(store, stream, hierarchy).await?.is_some_and(PermissionLevel::can_update))
    }

    /// Returns true when the stream itself may be updated or deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_manage_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        Ok(self.level_for(store, stream, hierarchy).await?.is_some_and(PermissionLevel::can_manage))
    }

    /// Returns true when a child stream may be created under the stream.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Hierarchy`] when the parent walk fails.
    pub async fn can_create_child_on_stream<H>(
        &self,
        store: &StoreId,
        stream: &str,
        hierarchy: &H,
    ) -> Result<bool, AccessError>
    where
        H: StreamHierarchy + ?Sized,
    {
        self.can_manage_stream(store, stream, hierarchy).await
    }

    /// Returns true when events carrying the tag may be read.
    #[must_use]
    pub fn can_get_events_with_tag(&self, tag: &str) -> bool {
        self.tag_level_for(tag).is_some_and(PermissionLevel::can_read)
    }

    /// Returns true when the access sets the feature to `forbidden`.
    #[must_use]
    pub fn is_feature_forbidden(&self, feature: &str) -> bool {
        self.index()
            .feature(feature)
            .is_some_and(|grant| grant.setting.as_deref() == Some(SETTING_FORBIDDEN))
    }

    /// Returns the limitation payload attached to a method in a store.
    #[must_use]
    pub fn limitation_for(&self, method: &str, store: &StoreId) -> Option<&Value> {
        self.index().limitation(method, store)
    }
}
