// crates/stream-query/src/schema.rs
// ============================================================================
// Module: Stream Query Schema
// Description: Operator rules table and identifier validation.
// Purpose: Check operand shapes, identifier syntax, store existence and store
//          grouping; gate identifiers through the authorization oracle.
// Dependencies: serde_json, crate::{error, identifiers, interfaces, query}
// ============================================================================

//! ## Overview
//! The schema has two halves. The operator rules table ([`Operator`] and its
//! [`OperandShape`]) is consulted by the normalizer while it builds the closed
//! [`Expr`] enum, so operand arity and type are checked before any tree
//! exists. [`validate`] then walks the built tree and turns raw identifier
//! strings into [`StreamRef`]s, in this order:
//!
//! 1. identifier syntax (forbidden characters, store prefix grammar),
//! 2. reserved tokens (`#*`),
//! 3. wildcard placement (`*` only under `EXPAND`),
//! 4. store existence,
//! 5. authorization (unauthorized ids are dropped, never reported as errors),
//! 6. store grouping (each top-level disjunct touches one store).
//!
//! Security posture: query input is untrusted; every identifier is checked
//! before it reaches an expander or a backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;
use smallvec::SmallVec;

use crate::error::QueryError;
use crate::error::QueryResult;
use crate::identifiers::RESERVED_TAG_WILDCARD;
use crate::identifiers::StoreCatalog;
use crate::identifiers::StoreId;
use crate::identifiers::StreamRef;
use crate::identifiers::validate_stream_id;
use crate::interfaces::StreamAuthorizer;
use crate::query::Expr;

// ============================================================================
// SECTION: Operator Rules
// ============================================================================

/// Upper-case command accepted in `{COMMAND: operand}` objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `EQUAL`
    Equal,
    /// `NOTEQUAL`
    NotEqual,
    /// `EXPAND`
    Expand,
    /// `NOTEXPAND`
    NotExpand,
    /// `IN`
    In,
    /// `NOTIN`
    NotIn,
    /// `NOT`
    Not,
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Operand shape required by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// Exactly one identifier string.
    SingleId,
    /// Non-empty array of identifier strings.
    IdList,
    /// Non-empty array of sub-queries.
    SubQueries,
}

impl Operator {
    /// All operators, in rules-table order.
    pub const ALL: [Self; 9] = [
        Self::Equal,
        Self::NotEqual,
        Self::Expand,
        Self::NotExpand,
        Self::In,
        Self::NotIn,
        Self::Not,
        Self::And,
        Self::Or,
    ];

    /// Looks up an operator by its command key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }

    /// Returns the command key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOTEQUAL",
            Self::Expand => "EXPAND",
            Self::NotExpand => "NOTEXPAND",
            Self::In => "IN",
            Self::NotIn => "NOTIN",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Returns the operand shape the operator requires.
    #[must_use]
    pub const fn operand_shape(self) -> OperandShape {
        match self {
            Self::Equal | Self::NotEqual | Self::Expand | Self::NotExpand => {
                OperandShape::SingleId
            }
            Self::In | Self::NotIn | Self::Not => OperandShape::IdList,
            Self::And | Self::Or => OperandShape::SubQueries,
        }
    }
}

/// Extracts the single identifier operand of `op`.
pub(crate) fn single_id(op: Operator, operand: &Value, fragment: &Value) -> QueryResult<String> {
    match operand {
        Value::String(id) => Ok(id.clone()),
        _ => Err(QueryError::malformed(
            format!("'{}' requires a single stream id string", op.key()),
            fragment,
        )),
    }
}

/// Extracts the identifier list operand of `op`.
pub(crate) fn id_list(op: Operator, operand: &Value, fragment: &Value) -> QueryResult<Vec<String>> {
    let Value::Array(items) = operand else {
        return Err(QueryError::malformed(
            format!("'{}' requires an array of stream ids", op.key()),
            fragment,
        ));
    };
    if items.is_empty() {
        return Err(QueryError::malformed(
            format!("'{}' requires at least one stream id", op.key()),
            fragment,
        ));
    }
    items
        .iter()
        .map(|item| match item {
            Value::String(id) => Ok(id.clone()),
            _ => Err(QueryError::malformed(
                format!("'{}' accepts stream id strings only", op.key()),
                fragment,
            )),
        })
        .collect()
}

/// Extracts the sub-query list operand of `op`.
pub(crate) fn sub_queries<'a>(
    op: Operator,
    operand: &'a Value,
    fragment: &Value,
) -> QueryResult<&'a [Value]> {
    match operand {
        Value::Array(items) if items.is_empty() => Err(QueryError::malformed(
            format!("'{}' requires at least one sub-query", op.key()),
            fragment,
        )),
        Value::Array(items) => Ok(items),
        _ => Err(QueryError::malformed(
            format!("'{}' requires an array of sub-queries", op.key()),
            fragment,
        )),
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Outcome of validating a normalized expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Validated tree, `None` when nothing readable remains.
    pub expr: Option<Expr<StreamRef>>,
    /// Qualified identifiers removed because the caller may not read them.
    pub non_authorized: BTreeSet<String>,
}

/// Validates identifiers, gates them through `authorizer` and checks grouping.
///
/// # Errors
///
/// Returns [`QueryError::MalformedQuery`] for bad identifiers or mixed stores
/// and [`QueryError::UnknownReference`] for unknown stores.
pub fn validate<A>(
    expr: Option<Expr<String>>,
    catalog: &StoreCatalog,
    authorizer: &A,
) -> QueryResult<Validated>
where
    A: StreamAuthorizer + ?Sized,
{
    let mut validator = Validator {
        catalog,
        authorizer,
        non_authorized: BTreeSet::new(),
    };
    let expr = match expr {
        Some(expr) => validator.convert(&expr)?,
        None => None,
    };
    if let Some(expr) = &expr {
        check_store_grouping(expr)?;
    }
    Ok(Validated {
        expr,
        non_authorized: validator.non_authorized,
    })
}

/// Tree walker carrying the validation context.
struct Validator<'a, A: ?Sized> {
    /// Stores known to the deployment.
    catalog: &'a StoreCatalog,
    /// Authorization oracle.
    authorizer: &'a A,
    /// Identifiers dropped by the oracle.
    non_authorized: BTreeSet<String>,
}

impl<A> Validator<'_, A>
where
    A: StreamAuthorizer + ?Sized,
{
    /// Converts one node; `None` when every identifier was dropped.
    fn convert(&mut self, node: &Expr<String>) -> QueryResult<Option<Expr<StreamRef>>> {
        let converted = match node {
            Expr::Equal(id) => self.leaf(node, id)?.map(Expr::Equal),
            Expr::NotEqual(id) => self.leaf(node, id)?.map(Expr::NotEqual),
            Expr::Expand {
                id,
                excluded,
            } => {
                let excluded = self.exclusions(node, excluded)?;
                self.leaf(node, id)?.map(|id| Expr::Expand {
                    id,
                    excluded,
                })
            }
            Expr::NotExpand {
                id,
                excluded,
            } => {
                let excluded = self.exclusions(node, excluded)?;
                self.leaf(node, id)?.map(|id| Expr::NotExpand {
                    id,
                    excluded,
                })
            }
            Expr::In(ids) => self.id_set(node, ids)?.map(Expr::In),
            Expr::NotIn(ids) => self.id_set(node, ids)?.map(Expr::NotIn),
            Expr::Not {
                ids,
                excluded,
            } => {
                let excluded = self.exclusions(node, excluded)?;
                self.id_set(node, ids)?.map(|ids| Expr::Not {
                    ids,
                    excluded,
                })
            }
            Expr::And(children) => self.children(children)?.map(Expr::And),
            Expr::Or(children) => self.children(children)?.map(Expr::Or),
        };
        Ok(converted)
    }

    /// Converts the children of a container, pruning dropped ones.
    fn children(
        &mut self,
        children: &[Box<Expr<String>>],
    ) -> QueryResult<Option<SmallVec<[Box<Expr<StreamRef>>; 4]>>> {
        let mut kept = SmallVec::new();
        for child in children {
            if let Some(converted) = self.convert(child)? {
                kept.push(Box::new(converted));
            }
        }
        Ok(if kept.is_empty() { None } else { Some(kept) })
    }

    /// Checks and authorizes a single-identifier operand.
    fn leaf(&mut self, node: &Expr<String>, raw: &str) -> QueryResult<Option<StreamRef>> {
        let allow_wildcard = matches!(node, Expr::Expand { .. });
        let stream = self.check(node, raw, allow_wildcard)?;
        Ok(self.authorize(stream))
    }

    /// Checks and authorizes an identifier list, `None` when all are dropped.
    fn id_set(&mut self, node: &Expr<String>, ids: &[String]) -> QueryResult<Option<Vec<StreamRef>>> {
        let mut kept = Vec::with_capacity(ids.len());
        for raw in ids {
            let stream = self.check(node, raw, false)?;
            if let Some(stream) = self.authorize(stream) {
                kept.push(stream);
            }
        }
        Ok(if kept.is_empty() { None } else { Some(kept) })
    }

    /// Checks exclusion identifiers; exclusions are never authorized.
    fn exclusions(&self, node: &Expr<String>, ids: &[String]) -> QueryResult<Vec<StreamRef>> {
        ids.iter().map(|raw| self.check(node, raw, true)).collect()
    }

    /// Runs the syntax, reserved-token, wildcard and store checks.
    fn check(&self, node: &Expr<String>, raw: &str, allow_wildcard: bool) -> QueryResult<StreamRef> {
        if let Err(err) = validate_stream_id(raw) {
            return Err(QueryError::malformed(format!("stream id `{raw}`: {err}"), &node.to_json()));
        }
        if raw == RESERVED_TAG_WILDCARD {
            return Err(QueryError::malformed(
                format!("'{RESERVED_TAG_WILDCARD}' is not a valid stream id"),
                &node.to_json(),
            ));
        }
        let stream = StreamRef::parse(raw)
            .map_err(|err| QueryError::malformed(err.to_string(), &node.to_json()))?;
        if stream.is_wildcard() && !allow_wildcard {
            return Err(QueryError::malformed(
                "'*' is only allowed in an 'any' or 'EXPAND' clause",
                &node.to_json(),
            ));
        }
        if !self.catalog.contains(&stream.store) {
            return Err(QueryError::unknown_reference(
                format!("store `{}` does not exist", stream.store),
                node.to_json().to_string(),
            ));
        }
        Ok(stream)
    }

    /// Asks the oracle; records and drops unauthorized identifiers.
    fn authorize(&mut self, stream: StreamRef) -> Option<StreamRef> {
        if self.authorizer.is_authorized(&stream) {
            Some(stream)
        } else {
            self.non_authorized.insert(stream.qualified());
            None
        }
    }
}

/// Rejects top-level disjuncts that reference more than one store.
fn check_store_grouping(expr: &Expr<StreamRef>) -> QueryResult<()> {
    let disjuncts: Vec<&Expr<StreamRef>> = match expr {
        Expr::Or(children) => children.iter().map(|child| &**child).collect(),
        other => vec![other],
    };
    for disjunct in disjuncts {
        let stores = referenced_stores(disjunct);
        if stores.len() > 1 {
            let names: Vec<&str> = stores.iter().map(|store| store.as_str()).collect();
            return Err(QueryError::malformed(
                format!("sub-query mixes streams from stores: {}", names.join(", ")),
                &disjunct.to_json(),
            ));
        }
    }
    Ok(())
}

/// Collects the stores of the primary identifiers (exclusions ignored).
fn referenced_stores(expr: &Expr<StreamRef>) -> BTreeSet<&StoreId> {
    let mut stores = BTreeSet::new();
    collect_stores(expr, &mut stores);
    stores
}

/// Recursive helper for [`referenced_stores`].
fn collect_stores<'a>(expr: &'a Expr<StreamRef>, stores: &mut BTreeSet<&'a StoreId>) {
    match expr {
        Expr::Equal(id)
        | Expr::NotEqual(id)
        | Expr::Expand {
            id, ..
        }
        | Expr::NotExpand {
            id, ..
        } => {
            stores.insert(&id.store);
        }
        Expr::In(ids)
        | Expr::NotIn(ids)
        | Expr::Not {
            ids, ..
        } => stores.extend(ids.iter().map(|id| &id.store)),
        Expr::And(children) | Expr::Or(children) => {
            for child in children {
                collect_stores(child, stores);
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
