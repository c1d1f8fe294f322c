// crates/stream-access/src/index.rs
// ============================================================================
// Module: Access Permission Index
// Description: Derived lookup tables over an access's permission records.
// Purpose: Answer per-stream, per-tag and per-feature questions in O(log n).
// Dependencies: serde_json, stream-query, crate::{access, level}
// ============================================================================

//! ## Overview
//! The index is built once per access and never mutated afterwards. Stream
//! and tag grants keep the highest-ranked level when an access names the same
//! target twice; on a rank tie the earlier grant stays. Stream ids are attributed to their store, so `:_audit:access-1` and
//! `access-1` index under different stores. Limitations are indexed per
//! method and store; the last record naming a method in a store wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use stream_query::StoreId;
use stream_query::StreamRef;
use stream_query::WILDCARD;

use crate::access::PermissionRecord;
use crate::level::PermissionLevel;

// ============================================================================
// SECTION: Feature Grants
// ============================================================================

/// Indexed feature record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGrant {
    /// Feature setting, such as `forbidden`.
    pub setting: Option<String>,
    /// Level attached to the feature.
    pub level: Option<PermissionLevel>,
}

// ============================================================================
// SECTION: Index
// ============================================================================

/// Permission lookup tables derived from an access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessPermissionIndex {
    /// Stream levels per store; `*` is the store-wide grant.
    streams: BTreeMap<StoreId, BTreeMap<String, PermissionLevel>>,
    /// Tag levels; `*` is the all-tags grant.
    tags: BTreeMap<String, PermissionLevel>,
    /// Feature records by name.
    features: BTreeMap<String, FeatureGrant>,
    /// Limitation payloads per method and store.
    limitations: BTreeMap<String, BTreeMap<StoreId, Value>>,
}

impl AccessPermissionIndex {
    /// Builds the index from permission records.
    ///
    /// Stream records whose id cannot be attributed to a store are skipped.
    #[must_use]
    pub fn build(records: &[PermissionRecord]) -> Self {
        let mut index = Self::default();
        for record in records {
            match record {
                PermissionRecord::Stream {
                    stream_id,
                    level,
                    limitations,
                } => {
                    let Ok(stream) = StreamRef::parse(stream_id) else {
                        continue;
                    };
                    for (method, payload) in limitations {
                        index
                            .limitations
                            .entry(method.clone())
                            .or_default()
                            .insert(stream.store.clone(), payload.clone());
                    }
                    keep_highest(
                        index.streams.entry(stream.store).or_default(),
                        stream.stream,
                        *level,
                    );
                }
                PermissionRecord::Tag {
                    tag,
                    level,
                    ..
                } => keep_highest(&mut index.tags, tag.clone(), *level),
                PermissionRecord::Feature {
                    feature,
                    setting,
                    level,
                    ..
                } => {
                    index.features.insert(
                        feature.clone(),
                        FeatureGrant {
                            setting: setting.clone(),
                            level: *level,
                        },
                    );
                }
            }
        }
        index
    }

    /// Returns the explicit level granted on one stream.
    #[must_use]
    pub fn stream_level(&self, store: &StoreId, stream: &str) -> Option<PermissionLevel> {
        self.streams.get(store)?.get(stream).copied()
    }

    /// Returns the store-wide `*` grant.
    #[must_use]
    pub fn store_wildcard_level(&self, store: &StoreId) -> Option<PermissionLevel> {
        self.stream_level(store, WILDCARD)
    }

    /// Returns the explicit level granted on one tag.
    #[must_use]
    pub fn tag_level(&self, tag: &str) -> Option<PermissionLevel> {
        self.tags.get(tag).copied()
    }

    /// Returns the feature record.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&FeatureGrant> {
        self.features.get(name)
    }

    /// Returns the limitation payload for a method in a store.
    #[must_use]
    pub fn limitation(&self, method: &str, store: &StoreId) -> Option<&Value> {
        self.limitations.get(method)?.get(store)
    }

    /// Number of indexed stream grants across stores.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.values().map(BTreeMap::len).sum()
    }

    /// Number of indexed tag grants.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of indexed features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

/// Inserts a level; on collision only a strictly higher rank replaces it.
fn keep_highest(map: &mut BTreeMap<String, PermissionLevel>, key: String, level: PermissionLevel) {
    map.entry(key)
        .and_modify(|existing| {
            if level.outranks(*existing) {
                *existing = level;
            }
        })
        .or_insert(level);
}

// ============================================================================
// SECTION: Tests
// ============================================================================
