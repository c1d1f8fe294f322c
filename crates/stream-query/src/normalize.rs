// crates/stream-query/src/normalize.rs
// ============================================================================
// Module: Stream Query Normalizer
// Description: Sugar removal for every accepted stream query surface syntax.
// Purpose: Turn untrusted JSON into the closed `Expr` operator set.
// Dependencies: serde_json, crate::{error, query, schema}
// ============================================================================

//! ## Overview
//! Accepted shapes:
//! - a bare string `S`, meaning `EXPAND(S)`;
//! - an array, meaning `OR` of its non-null elements;
//! - a block `{any?, all?, not?}` with lower-case keys;
//! - a single-key command object such as `{"IN": [..]}` or `{"AND": [..]}`;
//! - `null`, meaning "match nothing".
//!
//! The normalizer never consults the authorization oracle. Identifier checks
//! happen later in [`crate::schema::validate`].
//! Security posture: input is untrusted; nesting depth and identifier count are
//! bounded by [`QueryLimits`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::error::QueryError;
use crate::error::QueryResult;
use crate::identifiers::WILDCARD;
use crate::query::Expr;
use crate::schema;
use crate::schema::OperandShape;
use crate::schema::Operator;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum nesting depth of a query.
pub const DEFAULT_MAX_DEPTH: usize = 32;
/// Default maximum number of identifiers referenced by a query.
pub const DEFAULT_MAX_IDENTIFIERS: usize = 1_000;

/// Bounds applied to untrusted query input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Maximum nesting depth of arrays and objects.
    pub max_depth: usize,
    /// Maximum number of identifiers, exclusions included.
    pub max_identifiers: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_identifiers: DEFAULT_MAX_IDENTIFIERS,
        }
    }
}

// ============================================================================
// SECTION: Block Keys
// ============================================================================

/// Block key selecting streams of which any must match.
const BLOCK_ANY: &str = "any";
/// Block key selecting streams of which all must match.
const BLOCK_ALL: &str = "all";
/// Block key selecting streams that must not match.
const BLOCK_NOT: &str = "not";

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Normalizes a raw query value.
///
/// Returns `Ok(None)` when the query matches nothing.
///
/// # Errors
///
/// Returns [`QueryError::MalformedQuery`] when the value has an unsupported
/// shape, an operand of the wrong type or arity, or exceeds `limits`.
pub fn normalize(value: &Value, limits: &QueryLimits) -> QueryResult<Option<Expr<String>>> {
    let mut normalizer = Normalizer {
        limits: *limits,
        nesting: 0,
        identifiers: 0,
    };
    normalizer.node(value)
}

/// Parses a query passed as a query-string parameter.
///
/// Text starting with `[` or `{` is JSON; anything else is a bare identifier.
///
/// # Errors
///
/// Returns [`QueryError::MalformedQuery`] when JSON text does not parse.
pub fn parse_param(text: &str) -> QueryResult<Value> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(trimmed)
            .map_err(|err| QueryError::malformed_text(format!("invalid JSON: {err}"), text))
    } else {
        Ok(Value::String(text.to_string()))
    }
}

// ============================================================================
// SECTION: Normalizer
// ============================================================================

/// Recursive normalizer state.
struct Normalizer {
    /// Configured bounds.
    limits: QueryLimits,
    /// Current nesting depth.
    nesting: usize,
    /// Identifiers seen so far.
    identifiers: usize,
}

impl Normalizer {
    /// Normalizes any query value.
    fn node(&mut self, value: &Value) -> QueryResult<Option<Expr<String>>> {
        match value {
            Value::Null => Ok(None),
            Value::String(id) => {
                self.count(1, value)?;
                Ok(Some(Expr::expand(id.clone())))
            }
            Value::Array(items) => self.with_nesting(value, |this| this.array(items, value)),
            Value::Object(map) => self.with_nesting(value, |this| this.object(map, value)),
            Value::Bool(_) | Value::Number(_) => Err(QueryError::malformed(
                "expected a stream id, an array, or an object",
                value,
            )),
        }
    }

    /// Normalizes a bare array into an `OR` of its non-null elements.
    fn array(&mut self, items: &[Value], value: &Value) -> QueryResult<Option<Expr<String>>> {
        let present: Vec<&Value> = items.iter().filter(|item| !item.is_null()).collect();
        match present.as_slice() {
            [] => Ok(None),
            [single] => self.node(single),
            many => {
                let mut children = Vec::with_capacity(many.len());
                for item in many {
                    if let Some(child) = self.node(item)? {
                        children.push(child);
                    }
                }
                check_wildcard_placement(&children, false, value)?;
                Ok(collect_children(children, Expr::or))
            }
        }
    }

    /// Dispatches an object to the block or command parser.
    fn object(
        &mut self,
        map: &Map<String, Value>,
        value: &Value,
    ) -> QueryResult<Option<Expr<String>>> {
        if [BLOCK_ANY, BLOCK_ALL, BLOCK_NOT].iter().any(|key| map.contains_key(*key)) {
            return self.block(map, value);
        }
        let mut entries = map.iter();
        let (Some((key, operand)), None) = (entries.next(), entries.next()) else {
            return Err(QueryError::malformed(
                "a query object must hold exactly one operator",
                value,
            ));
        };
        let op = Operator::from_key(key)
            .ok_or_else(|| QueryError::malformed(format!("unknown operator '{key}'"), value))?;
        self.command(op, operand, value)
    }

    /// Builds the closed enum for `{COMMAND: operand}`.
    fn command(
        &mut self,
        op: Operator,
        operand: &Value,
        fragment: &Value,
    ) -> QueryResult<Option<Expr<String>>> {
        match op.operand_shape() {
            OperandShape::SingleId => {
                let id = schema::single_id(op, operand, fragment)?;
                self.count(1, fragment)?;
                Ok(Some(match op {
                    Operator::Equal => Expr::Equal(id),
                    Operator::NotEqual => Expr::NotEqual(id),
                    Operator::NotExpand => Expr::NotExpand {
                        id,
                        excluded: Vec::new(),
                    },
                    _ => Expr::expand(id),
                }))
            }
            OperandShape::IdList => {
                let ids = schema::id_list(op, operand, fragment)?;
                self.count(ids.len(), fragment)?;
                Ok(Some(match op {
                    Operator::In => Expr::In(ids),
                    Operator::NotIn => Expr::NotIn(ids),
                    _ => Expr::Not {
                        ids,
                        excluded: Vec::new(),
                    },
                }))
            }
            OperandShape::SubQueries => {
                let items = schema::sub_queries(op, operand, fragment)?;
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(child) = self.node(item)? {
                        children.push(child);
                    }
                }
                check_wildcard_placement(&children, op == Operator::And, fragment)?;
                let build: fn(Vec<Expr<String>>) -> Expr<String> =
                    if op == Operator::And { Expr::and } else { Expr::or };
                Ok(collect_children(children, build))
            }
        }
    }

    /// Normalizes a `{any?, all?, not?}` block.
    fn block(&mut self, map: &Map<String, Value>, value: &Value) -> QueryResult<Option<Expr<String>>> {
        let is_block_key = |key: &&String| [BLOCK_ANY, BLOCK_ALL, BLOCK_NOT].contains(&key.as_str());
        if let Some(key) = map.keys().find(|key| !is_block_key(key)) {
            return Err(QueryError::malformed(
                format!("unexpected key '{key}' in an any/all/not query"),
                value,
            ));
        }
        let any = map.get(BLOCK_ANY).map(|ids| block_ids(BLOCK_ANY, ids, value)).transpose()?;
        let all = map.get(BLOCK_ALL).map(|ids| block_ids(BLOCK_ALL, ids, value)).transpose()?;
        let not = map.get(BLOCK_NOT).map(|ids| block_ids(BLOCK_NOT, ids, value)).transpose()?;

        if let Some(any) = &any
            && any.iter().any(|id| is_wildcard_text(id))
        {
            if any.len() > 1 {
                return Err(QueryError::malformed(
                    "'*' cannot be combined with other streams in 'any'",
                    value,
                ));
            }
            if all.is_some() {
                return Err(QueryError::malformed("'*' in 'any' cannot be combined with 'all'", value));
            }
        }
        for (key, ids) in [(BLOCK_ALL, &all), (BLOCK_NOT, &not)] {
            if ids.iter().flatten().any(|id| is_wildcard_text(id)) {
                return Err(QueryError::malformed(format!("'*' is not allowed in '{key}'"), value));
            }
        }

        let not_ids = not.clone().unwrap_or_default();
        let any_ids = any.clone().unwrap_or_default();
        let counted: usize =
            [&any, &all, &not].iter().map(|ids| ids.as_ref().map_or(0, Vec::len)).sum();
        self.count(counted, value)?;

        let mut parts = Vec::with_capacity(3);
        if let Some(any) = any {
            parts.push(Expr::or(any.into_iter().map(|id| expand_excluding(id, &not_ids)).collect()));
        }
        if let Some(all) = all {
            parts.push(Expr::and(all.into_iter().map(|id| expand_excluding(id, &not_ids)).collect()));
        }
        if let Some(ids) = not {
            parts.push(Expr::Not {
                ids,
                excluded: any_ids,
            });
        }
        Ok(collect_children(parts, Expr::and))
    }

    /// Adds identifiers to the running count and enforces the limit.
    fn count(&mut self, added: usize, fragment: &Value) -> QueryResult<()> {
        self.identifiers = self.identifiers.saturating_add(added);
        if self.identifiers > self.limits.max_identifiers {
            return Err(QueryError::malformed(
                format!("query references more than {} stream ids", self.limits.max_identifiers),
                fragment,
            ));
        }
        Ok(())
    }

    /// Runs a step one nesting level deeper, enforcing the depth limit.
    fn with_nesting<T>(
        &mut self,
        fragment: &Value,
        f: impl FnOnce(&mut Self) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let next_depth = self.nesting + 1;
        if next_depth > self.limits.max_depth {
            return Err(QueryError::malformed(
                format!("query nesting exceeds the maximum depth of {}", self.limits.max_depth),
                fragment,
            ));
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the identifiers of a block key; `any` also accepts the bare `'*'`.
fn block_ids(key: &str, ids: &Value, fragment: &Value) -> QueryResult<Vec<String>> {
    match ids {
        Value::String(id) if key == BLOCK_ANY && is_wildcard_text(id) => Ok(vec![id.clone()]),
        Value::Array(items) if items.is_empty() => {
            Err(QueryError::malformed(format!("'{key}' requires at least one stream id"), fragment))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(id) => Ok(id.clone()),
                other => Err(QueryError::malformed(
                    format!("'{key}' accepts stream id strings only"),
                    &json!({ key: other }),
                )),
            })
            .collect(),
        _ => Err(QueryError::malformed(format!("'{key}' requires an array of stream ids"), fragment)),
    }
}

/// Returns true for `*` and store-scoped wildcards such as `:_audit:*`.
fn is_wildcard_text(id: &str) -> bool {
    id == WILDCARD
        || (id.starts_with(':') && id.rsplit_once(':').is_some_and(|(_, stream)| stream == WILDCARD))
}

/// Returns true for an expansion of `*`, possibly wrapped in one-child containers.
fn is_wildcard_clause(expr: &Expr<String>) -> bool {
    match expr {
        Expr::Expand {
            id, ..
        } => is_wildcard_text(id),
        Expr::And(children) | Expr::Or(children) => {
            matches!(children.as_slice(), [only] if is_wildcard_clause(only))
        }
        _ => false,
    }
}

/// Rejects `*` required by a conjunction or listed next to other clauses.
fn check_wildcard_placement(
    children: &[Expr<String>],
    conjunctive: bool,
    fragment: &Value,
) -> QueryResult<()> {
    if !children.iter().any(is_wildcard_clause) {
        return Ok(());
    }
    if conjunctive {
        return Err(QueryError::malformed("'*' is not allowed in 'AND'", fragment));
    }
    if children.len() > 1 {
        return Err(QueryError::malformed(
            "'*' cannot be combined with other streams in the same clause",
            fragment,
        ));
    }
    Ok(())
}

/// Builds an `EXPAND` that skips the given streams.
fn expand_excluding(id: String, excluded: &[String]) -> Expr<String> {
    Expr::Expand {
        id,
        excluded: excluded.to_vec(),
    }
}

/// Wraps surviving children; `None` when none survive.
fn collect_children(
    mut children: Vec<Expr<String>>,
    build: fn(Vec<Expr<String>>) -> Expr<String>,
) -> Option<Expr<String>> {
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(build(children)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
