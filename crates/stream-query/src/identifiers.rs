// crates/stream-query/src/identifiers.rs
// ============================================================================
// Module: Stream Identifiers
// Description: Store-scoped stream identifiers and their syntax rules.
// Purpose: Parse surface identifiers into fully-qualified references and reject
//          malformed or unsafe identifier text.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Stream identifiers are opaque strings scoped to exactly one store. The
//! surface form of a non-local identifier is `:<store>:<stream>`; bare
//! identifiers belong to the local store, and the legacy `.` prefix denotes the
//! account (system) store. Identifier text is checked for forbidden characters
//! during querying; the stricter creation syntax applies only when new
//! identifiers are minted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identifier of the default local store.
pub const LOCAL_STORE: &str = "local";
/// Identifier of the account/system streams store.
pub const SYSTEM_STORE: &str = "_system";
/// Identifier of the audit log store.
pub const AUDIT_STORE: &str = "_audit";
/// Wildcard stream identifier meaning "every accessible stream of the store".
pub const WILDCARD: &str = "*";
/// Reserved token that is never a valid stream identifier.
pub const RESERVED_TAG_WILDCARD: &str = "#*";
/// Maximum length of a stream identifier minted by the API.
const MAX_CREATION_LENGTH: usize = 100;

// ============================================================================
// SECTION: Store Identifiers
// ============================================================================

/// Namespace partitioning stream identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// Creates a new store identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the local store identifier.
    #[must_use]
    pub fn local() -> Self {
        Self::new(LOCAL_STORE)
    }

    /// Returns the account/system store identifier.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SYSTEM_STORE)
    }

    /// Returns the audit store identifier.
    #[must_use]
    pub fn audit() -> Self {
        Self::new(AUDIT_STORE)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the local store.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_STORE
    }

    /// Returns true for the store holding account streams.
    #[must_use]
    pub fn is_account(&self) -> bool {
        self.0 == SYSTEM_STORE
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StoreId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Set of stores known to the deployment.
///
/// # Invariants
/// - Always contains the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCatalog {
    /// Known store identifiers.
    stores: BTreeSet<StoreId>,
}

impl StoreCatalog {
    /// Creates a catalog with the well-known stores only.
    #[must_use]
    pub fn new() -> Self {
        let stores = [StoreId::local(), StoreId::system(), StoreId::audit()].into_iter().collect();
        Self {
            stores,
        }
    }

    /// Returns a catalog that additionally knows the given store.
    #[must_use]
    pub fn with_store(mut self, store: StoreId) -> Self {
        self.stores.insert(store);
        self
    }

    /// Returns true when the store is known.
    #[must_use]
    pub fn contains(&self, store: &StoreId) -> bool {
        self.stores.contains(store)
    }

    /// Iterates over the known stores in order.
    pub fn iter(&self) -> impl Iterator<Item = &StoreId> {
        self.stores.iter()
    }
}

impl Default for StoreCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Stream References
// ============================================================================

/// Errors raised when a surface identifier cannot be attributed to a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamRefError {
    /// The identifier is empty.
    #[error("stream id must not be empty")]
    Empty,
    /// A `:` prefix is not followed by `<store>:`.
    #[error("store prefix of `{0}` is not terminated by ':'")]
    UnterminatedStore(String),
    /// The store part of a prefixed identifier is empty.
    #[error("store prefix of `{0}` is empty")]
    MissingStore(String),
    /// The stream part of a prefixed identifier is empty.
    #[error("`{0}` names a store but no stream")]
    MissingStream(String),
}

/// Fully-qualified stream identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamRef {
    /// Store owning the stream.
    pub store: StoreId,
    /// Store-local stream identifier.
    pub stream: String,
}

impl StreamRef {
    /// Creates a reference from its parts.
    #[must_use]
    pub fn new(store: StoreId, stream: impl Into<String>) -> Self {
        Self {
            store,
            stream: stream.into(),
        }
    }

    /// Creates a local-store reference.
    #[must_use]
    pub fn local(stream: impl Into<String>) -> Self {
        Self::new(StoreId::local(), stream)
    }

    /// Parses a surface identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StreamRefError`] when the store prefix is malformed.
    pub fn parse(raw: &str) -> Result<Self, StreamRefError> {
        if raw.is_empty() {
            return Err(StreamRefError::Empty);
        }
        if let Some(rest) = raw.strip_prefix(':') {
            let (store, stream) = rest
                .split_once(':')
                .ok_or_else(|| StreamRefError::UnterminatedStore(raw.to_string()))?;
            if store.is_empty() {
                return Err(StreamRefError::MissingStore(raw.to_string()));
            }
            if stream.is_empty() {
                return Err(StreamRefError::MissingStream(raw.to_string()));
            }
            return Ok(Self::new(StoreId::new(store), stream));
        }
        if let Some(stream) = raw.strip_prefix('.')
            && !stream.is_empty()
        {
            return Ok(Self::new(StoreId::system(), stream));
        }
        Ok(Self::local(raw))
    }

    /// Renders the surface form used inside canonical trees.
    #[must_use]
    pub fn qualified(&self) -> String {
        if self.store.is_local() {
            self.stream.clone()
        } else {
            format!(":{}:{}", self.store, self.stream)
        }
    }

    /// Returns true when the reference is the store wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.stream == WILDCARD
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

// ============================================================================
// SECTION: Identifier Validation
// ============================================================================

/// A forbidden character found in a stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("forbidden character {ch:?} at byte {position}")]
pub struct ForbiddenChar {
    /// Offending character.
    pub ch: char,
    /// Byte offset of the character.
    pub position: usize,
}

/// Rejects identifiers containing quotes, backslashes, NUL or control characters.
///
/// # Errors
///
/// Returns the first [`ForbiddenChar`] encountered.
pub fn validate_stream_id(id: &str) -> Result<(), ForbiddenChar> {
    match id.char_indices().find(|(_, ch)| is_forbidden(*ch)) {
        Some((position, ch)) => Err(ForbiddenChar {
            ch,
            position,
        }),
        None => Ok(()),
    }
}

/// Returns true when the identifier matches the creation syntax
/// (lowercase alphanumerics and hyphens, 1 to 100 characters).
#[must_use]
pub fn is_valid_for_creation(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CREATION_LENGTH
        && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Returns true for characters that may never appear in an identifier.
fn is_forbidden(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '\\') || ch.is_control()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for identifier parsing and validation.

    use super::*;

    #[test]
    fn parses_store_prefixes() {
        assert_eq!(StreamRef::parse("diary"), Ok(StreamRef::local("diary")));
        assert_eq!(
            StreamRef::parse(":_audit:access-1"),
            Ok(StreamRef::new(StoreId::audit(), "access-1"))
        );
        assert_eq!(StreamRef::parse(".email"), Ok(StreamRef::new(StoreId::system(), "email")));
        assert!(matches!(StreamRef::parse(":_audit"), Err(StreamRefError::UnterminatedStore(_))));
        assert!(matches!(StreamRef::parse("::x"), Err(StreamRefError::MissingStore(_))));
        assert!(matches!(StreamRef::parse(":ext:"), Err(StreamRefError::MissingStream(_))));
    }

    #[test]
    fn qualified_round_trips_through_parse() {
        let audit = StreamRef::new(StoreId::audit(), "access-1");
        assert_eq!(audit.qualified(), ":_audit:access-1");
        assert_eq!(StreamRef::parse(&audit.qualified()), Ok(audit));
        assert_eq!(StreamRef::local("a").qualified(), "a");
    }

    #[test]
    fn forbidden_characters_are_reported_with_position() {
        assert_eq!(validate_stream_id("ok-id"), Ok(()));
        assert_eq!(
            validate_stream_id("ab\"c"),
            Err(ForbiddenChar {
                ch: '"',
                position: 2
            })
        );
        assert!(validate_stream_id("a\0").is_err());
        assert!(validate_stream_id("a\\b").is_err());
        assert!(validate_stream_id("line\nbreak").is_err());
    }

    #[test]
    fn creation_syntax_is_strict() {
        assert!(is_valid_for_creation("health-2024"));
        assert!(!is_valid_for_creation(""));
        assert!(!is_valid_for_creation("Upper"));
        assert!(!is_valid_for_creation("under_score"));
        assert!(!is_valid_for_creation(&"a".repeat(101)));
        assert!(is_valid_for_creation(&"a".repeat(100)));
    }
}
