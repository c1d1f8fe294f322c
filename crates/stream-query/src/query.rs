// crates/stream-query/src/query.rs
// ============================================================================
// Module: Stream Query Trees
// Description: Pre-canonical and canonical boolean trees over stream identifiers.
// Purpose: Define `Expr` (sugar-free operator set before expansion) and `QueryNode`
//          (canonical form consumed by the optimizer and compilers).
// Dependencies: serde, serde_json, smallvec
// ============================================================================

//! ## Overview
//! Queries travel through two tree shapes. [`Expr`] is produced by the
//! normalizer: a closed operator set that still contains the expansion
//! operators (`EXPAND`, `NOTEXPAND`, `NOT`) and is generic over the identifier
//! type, so the same tree carries raw strings before validation and
//! [`StreamRef`](crate::StreamRef)s after. [`QueryNode`] is the canonical form:
//! only equality and set membership leaves under `AND`/`OR`. `None` at any
//! level means "match nothing".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use smallvec::SmallVec;

// ============================================================================
// SECTION: Pre-Canonical Expressions
// ============================================================================

/// Pre-canonical query expression.
///
/// `EXPAND`, `NOTEXPAND` and `NOT` carry the exclusion set used when their
/// identifiers are expanded into descendant closures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr<I> {
    /// Event is tagged with exactly this stream.
    Equal(I),
    /// Event is not tagged with this stream.
    NotEqual(I),
    /// Event is tagged with the stream or one of its descendants.
    Expand {
        /// Stream to expand.
        id: I,
        /// Streams that are skipped, together with their subtrees.
        excluded: Vec<I>,
    },
    /// Event is tagged with neither the stream nor any of its descendants.
    NotExpand {
        /// Stream to expand.
        id: I,
        /// Streams that are skipped, together with their subtrees.
        excluded: Vec<I>,
    },
    /// Event is tagged with one of these streams.
    In(Vec<I>),
    /// Event is tagged with none of these streams.
    NotIn(Vec<I>),
    /// Event is tagged with none of these streams nor their descendants.
    Not {
        /// Streams to exclude.
        ids: Vec<I>,
        /// Streams that are skipped while expanding `ids`.
        excluded: Vec<I>,
    },
    /// All children must hold.
    And(SmallVec<[Box<Self>; 4]>),
    /// At least one child must hold.
    Or(SmallVec<[Box<Self>; 4]>),
}

impl<I> Expr<I> {
    /// Creates a logical AND of the given expressions.
    pub fn and(children: Vec<Self>) -> Self {
        Self::And(children.into_iter().map(Box::new).collect())
    }

    /// Creates a logical OR of the given expressions.
    pub fn or(children: Vec<Self>) -> Self {
        Self::Or(children.into_iter().map(Box::new).collect())
    }

    /// Creates an expansion without exclusions.
    pub const fn expand(id: I) -> Self {
        Self::Expand {
            id,
            excluded: Vec::new(),
        }
    }

    /// Returns every identifier the expression references, exclusions included.
    pub fn identifiers(&self) -> Vec<&I> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    /// Recursive helper for [`Expr::identifiers`].
    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a I>) {
        match self {
            Self::Equal(id) | Self::NotEqual(id) => out.push(id),
            Self::Expand {
                id,
                excluded,
            }
            | Self::NotExpand {
                id,
                excluded,
            } => {
                out.push(id);
                out.extend(excluded);
            }
            Self::In(ids) | Self::NotIn(ids) => out.extend(ids),
            Self::Not {
                ids,
                excluded,
            } => {
                out.extend(ids);
                out.extend(excluded);
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_identifiers(out);
                }
            }
        }
    }
}

impl<I: fmt::Display> Expr<I> {
    /// Renders the expression in the operator-object JSON notation.
    pub fn to_json(&self) -> Value {
        fn ids<I: fmt::Display>(ids: &[I]) -> Value {
            Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
        }
        match self {
            Self::Equal(id) => json!({ "EQUAL": id.to_string() }),
            Self::NotEqual(id) => json!({ "NOTEQUAL": id.to_string() }),
            Self::Expand {
                id, ..
            } => json!({ "EXPAND": id.to_string() }),
            Self::NotExpand {
                id, ..
            } => json!({ "NOTEXPAND": id.to_string() }),
            Self::In(list) => json!({ "IN": ids(list) }),
            Self::NotIn(list) => json!({ "NOTIN": ids(list) }),
            Self::Not {
                ids: list, ..
            } => json!({ "NOT": ids(list) }),
            Self::And(children) => {
                json!({ "AND": children.iter().map(|child| child.to_json()).collect::<Vec<_>>() })
            }
            Self::Or(children) => {
                json!({ "OR": children.iter().map(|child| child.to_json()).collect::<Vec<_>>() })
            }
        }
    }
}

// ============================================================================
// SECTION: Canonical Query Nodes
// ============================================================================

/// Canonical query tree over qualified stream identifiers.
///
/// # Invariants
/// - After optimization: sets hold at least two ids, `And`/`Or` hold at least
///   two children, and no `Or` has an `Or` child nor an `And` an `And` child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryNode {
    /// Event is tagged with exactly this stream.
    #[serde(rename = "EQUAL")]
    Equal(String),
    /// Event is not tagged with this stream.
    #[serde(rename = "NOTEQUAL")]
    NotEqual(String),
    /// Event is tagged with one of these streams.
    #[serde(rename = "IN")]
    In(BTreeSet<String>),
    /// Event is tagged with none of these streams.
    #[serde(rename = "NOTIN")]
    NotIn(BTreeSet<String>),
    /// All children must hold.
    #[serde(rename = "AND")]
    And(Vec<Self>),
    /// At least one child must hold.
    #[serde(rename = "OR")]
    Or(Vec<Self>),
}

impl QueryNode {
    /// Builds an `In` node from any identifiers.
    pub fn in_set<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self::In(ids.into_iter().map(Into::into).collect())
    }

    /// Builds a `NotIn` node from any identifiers.
    pub fn not_in_set<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self::NotIn(ids.into_iter().map(Into::into).collect())
    }

    /// Evaluates the node against the stream ids an event is tagged with.
    ///
    /// Semantics follow document-store array matching: membership tests hold
    /// when any tag matches, negations when no tag matches.
    pub fn matches<S: AsRef<str>>(&self, stream_ids: &[S]) -> bool {
        let tagged = |id: &str| stream_ids.iter().any(|tag| tag.as_ref() == id);
        match self {
            Self::Equal(id) => tagged(id.as_str()),
            Self::NotEqual(id) => !tagged(id.as_str()),
            Self::In(ids) => ids.iter().any(|id| tagged(id.as_str())),
            Self::NotIn(ids) => !ids.iter().any(|id| tagged(id.as_str())),
            Self::And(children) => children.iter().all(|child| child.matches(stream_ids)),
            Self::Or(children) => children.iter().any(|child| child.matches(stream_ids)),
        }
    }

    /// Collects every identifier referenced by the node.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_identifiers(&mut out);
        out
    }

    /// Recursive helper for [`QueryNode::identifiers`].
    fn collect_identifiers<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Equal(id) | Self::NotEqual(id) => {
                out.insert(id);
            }
            Self::In(ids) | Self::NotIn(ids) => out.extend(ids.iter().map(String::as_str)),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_identifiers(out);
                }
            }
        }
    }

    /// Renders the node in the operator-object JSON notation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Equal(id) => json!({ "EQUAL": id }),
            Self::NotEqual(id) => json!({ "NOTEQUAL": id }),
            Self::In(ids) => json!({ "IN": ids }),
            Self::NotIn(ids) => json!({ "NOTIN": ids }),
            Self::And(children) => {
                json!({ "AND": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Or(children) => {
                json!({ "OR": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_json().fmt(f)
    }
}
