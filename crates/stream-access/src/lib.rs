// crates/stream-access/src/lib.rs
// ============================================================================
// Module: Stream Access Root
// Description: Public API surface for access permissions.
// Purpose: Expose accesses, permission indexes, the oracle and gated queries.
// Dependencies: crate::{access, cache, error, hierarchy, index, level, query,
//              resolver}
// ============================================================================

//! ## Overview
//! An [`Access`] carries permission records. A [`PermissionResolver`] indexes
//! them once into an [`AccessPermissionIndex`] and answers level checks with
//! inheritance along the stream hierarchy. [`AccessIndexCache`] shares
//! published indexes across requests, and [`resolve_for_access`] runs a stream
//! query so the caller only sees streams it may read.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod access;
pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod index;
pub mod level;
pub mod query;
pub mod resolver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::Access;
pub use access::AccessKind;
pub use access::AccessPolicy;
pub use access::FEATURE_SELF_AUDIT;
pub use access::FEATURE_SELF_REVOKE;
pub use access::Limitations;
pub use access::PermissionRecord;
pub use access::SETTING_FORBIDDEN;
pub use cache::AccessCacheKey;
pub use cache::AccessIndexCache;
pub use error::AccessError;
pub use error::AccessQueryError;
pub use hierarchy::StreamHierarchy;
pub use index::AccessPermissionIndex;
pub use index::FeatureGrant;
pub use level::PermissionLevel;
pub use query::AccessScopedExpander;
pub use query::QueryAuthorizer;
pub use query::resolve_for_access;
pub use resolver::PermissionResolver;
