// crates/stream-access/src/cache.rs
// ============================================================================
// Module: Access Index Cache
// Description: Bounded process-wide cache of published permission indexes.
// Purpose: Reuse indexes across requests made with the same access.
// Dependencies: stream-query, crate::{access, error, index, resolver}
// ============================================================================

//! ## Overview
//! Indexes are cached under the access id and under the access token, both
//! scoped by user, so requests authenticated either way share one index.
//! Entries are immutable `Arc`s; invalidation only removes keys, so resolvers
//! already holding an index keep a consistent view. When full, the oldest
//! inserted key is evicted first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use stream_query::NoopAuditSink;
use stream_query::QueryAuditSink;

use crate::access::Access;
use crate::access::AccessPolicy;
use crate::error::AccessError;
use crate::index::AccessPermissionIndex;
use crate::resolver::PermissionResolver;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Cache key for a published index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessCacheKey {
    /// Lookup by access id.
    Id {
        /// Owning user.
        user_id: String,
        /// Access identifier.
        access_id: String,
    },
    /// Lookup by access token.
    Token {
        /// Owning user.
        user_id: String,
        /// Bearer token.
        token: String,
    },
}

impl AccessCacheKey {
    /// Key addressing the access by id.
    #[must_use]
    pub fn by_id(access: &Access) -> Self {
        Self::Id {
            user_id: access.user_id.clone(),
            access_id: access.id.clone(),
        }
    }

    /// Key addressing the access by token.
    #[must_use]
    pub fn by_token(access: &Access) -> Self {
        Self::Token {
            user_id: access.user_id.clone(),
            token: access.token.clone(),
        }
    }

    /// Returns the owning user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Id {
                user_id, ..
            }
            | Self::Token {
                user_id, ..
            } => user_id,
        }
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Mutable cache state guarded by the cache mutex.
#[derive(Default)]
struct CacheState {
    /// Published indexes.
    entries: BTreeMap<AccessCacheKey, Arc<AccessPermissionIndex>>,
    /// Insertion order for eviction.
    order: VecDeque<AccessCacheKey>,
}

impl CacheState {
    /// Removes one key from both the map and the eviction order.
    fn remove(&mut self, key: &AccessCacheKey) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|queued| queued != key);
        }
    }
}

/// Bounded cache of permission indexes.
pub struct AccessIndexCache {
    /// Maximum number of cached keys; zero disables caching.
    capacity: usize,
    /// Policy applied to every index built through the cache.
    policy: AccessPolicy,
    /// Sink receiving index build events.
    audit: Arc<dyn QueryAuditSink>,
    /// Guarded state.
    state: Mutex<CacheState>,
}

impl AccessIndexCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(capacity: usize, policy: AccessPolicy) -> Self {
        Self {
            capacity,
            policy,
            audit: Arc::new(NoopAuditSink),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Routes index build events to the given sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn QueryAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the cache capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Locks the state.
    fn lock(&self) -> Result<MutexGuard<'_, CacheState>, AccessError> {
        self.state.lock().map_err(|_| AccessError::CachePoisoned)
    }

    /// Returns the cached index for a key.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn get(&self, key: &AccessCacheKey) -> Result<Option<Arc<AccessPermissionIndex>>, AccessError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    /// Publishes an index under a key, evicting the oldest keys when full.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn insert(
        &self,
        key: AccessCacheKey,
        index: Arc<AccessPermissionIndex>,
    ) -> Result<(), AccessError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut state = self.lock()?;
        state.remove(&key);
        while state.order.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, index);
        Ok(())
    }

    /// Returns a resolver for the access, reusing a cached index when present.
    ///
    /// A freshly built index is published under both the id and token keys.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn resolver_for(&self, access: Arc<Access>) -> Result<PermissionResolver, AccessError> {
        let id_key = AccessCacheKey::by_id(&access);
        let cached = match self.get(&id_key)? {
            Some(index) => Some(index),
            None => self.get(&AccessCacheKey::by_token(&access))?,
        };
        if let Some(index) = cached {
            return Ok(PermissionResolver::with_index(access, self.policy, index)
                .with_audit_sink(Arc::clone(&self.audit)));
        }
        let token_key = AccessCacheKey::by_token(&access);
        let resolver =
            PermissionResolver::new(access, self.policy).with_audit_sink(Arc::clone(&self.audit));
        let index = resolver.load_permissions();
        self.insert(id_key, Arc::clone(&index))?;
        self.insert(token_key, index)?;
        Ok(resolver)
    }

    /// Drops the id and token entries of an access.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn invalidate_access(&self, access: &Access) -> Result<(), AccessError> {
        let mut state = self.lock()?;
        state.remove(&AccessCacheKey::by_id(access));
        state.remove(&AccessCacheKey::by_token(access));
        Ok(())
    }

    /// Drops every entry owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn invalidate_user(&self, user_id: &str) -> Result<(), AccessError> {
        let mut state = self.lock()?;
        state.entries.retain(|key, _| key.user_id() != user_id);
        state.order.retain(|key| key.user_id() != user_id);
        Ok(())
    }

    /// Number of cached keys.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn len(&self) -> Result<usize, AccessError> {
        Ok(self.lock()?.entries.len())
    }

    /// Returns true when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::CachePoisoned`] when the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, AccessError> {
        Ok(self.lock()?.entries.is_empty())
    }
}
