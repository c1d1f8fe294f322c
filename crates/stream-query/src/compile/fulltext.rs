// crates/stream-query/src/compile/fulltext.rs
// ============================================================================
// Module: Full-Text Filter Compiler
// Description: Canonical tree to FTS5 MATCH expression.
// Purpose: Express stream filters over a space-delimited stream-id column.
// Dependencies: serde_json, crate::{error, identifiers, query}
// ============================================================================

//! ## Overview
//! The target column holds an event's stream ids separated by spaces and is
//! indexed with [`FTS5_TOKENIZER`], so each id is one token. Every id is
//! emitted as a quoted phrase and every composite is parenthesized. Ids the
//! tokenizer would split into several tokens are rejected, since a phrase of
//! several tokens also matches unrelated adjacent ids. The tokenizer still
//! folds case, so full-text matching is case-insensitive.
//!
//! Full-text engines only express negation as a binary operator, so negated
//! leaves attach to the positive siblings of their `AND`:
//! `AND(P1, P2, NOT n1, NOT n2)` becomes `((P1 AND P2) NOT (n1 OR n2))`. A
//! negation with no positive sibling is rejected. Positive clauses naming the
//! wildcard mean "no restriction" and are skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::QueryError;
use crate::error::QueryResult;
use crate::identifiers::WILDCARD;
use crate::query::QueryNode;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Punctuation kept inside tokens by [`FTS5_TOKENIZER`].
pub const FTS5_TOKEN_PUNCTUATION: &str = "-_:.";

/// FTS5 tokenizer that keeps stream-id punctuation and diacritics inside tokens.
pub const FTS5_TOKENIZER: &str = "unicode61 remove_diacritics 0 tokenchars '-_:.'";

/// Compiled full-text filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullTextFilter {
    /// No row can match.
    MatchNothing,
    /// Every row matches.
    Unrestricted,
    /// Rows matching the MATCH expression.
    Match(String),
}

impl FullTextFilter {
    /// Renders the filter as a SQL boolean clause over `column`.
    #[must_use]
    pub fn to_sql_clause(&self, column: &str) -> String {
        match self {
            Self::MatchNothing => "0".to_string(),
            Self::Unrestricted => "1".to_string(),
            Self::Match(expression) => format!("{column} MATCH '{}'", expression.replace('\'', "''")),
        }
    }
}

/// Compiles a canonical, store-local tree into a full-text filter.
///
/// # Errors
///
/// Returns [`QueryError::MalformedQuery`] when a negation has no positive
/// sibling to attach to, or when a stream id is not a single token.
pub fn compile_fulltext(node: Option<&QueryNode>) -> QueryResult<FullTextFilter> {
    let Some(node) = node else {
        return Ok(FullTextFilter::MatchNothing);
    };
    match compile(node)? {
        Term::Unrestricted => Ok(FullTextFilter::Unrestricted),
        Term::Positive(expression) => Ok(FullTextFilter::Match(expression)),
        Term::Negative(_) => Err(unsupported_negation(node)),
    }
}

// ============================================================================
// SECTION: Terms
// ============================================================================

/// Intermediate compilation result.
enum Term {
    /// No restriction.
    Unrestricted,
    /// Expression rows must match.
    Positive(String),
    /// Expression rows must not match.
    Negative(String),
}

/// Compiles one node into a term.
fn compile(node: &QueryNode) -> QueryResult<Term> {
    match node {
        QueryNode::Equal(id) if is_wildcard(id) => Ok(Term::Unrestricted),
        QueryNode::Equal(id) => Ok(Term::Positive(phrase(id)?)),
        QueryNode::In(ids) if ids.iter().any(|id| is_wildcard(id)) => Ok(Term::Unrestricted),
        QueryNode::In(ids) => Ok(Term::Positive(phrases(ids)?)),
        QueryNode::NotEqual(id) => Ok(Term::Negative(phrase(id)?)),
        QueryNode::NotIn(ids) => Ok(Term::Negative(phrases(ids)?)),
        QueryNode::And(children) => compile_and(node, children),
        QueryNode::Or(children) => compile_or(node, children),
    }
}

/// Compiles an `AND`, attaching negations to the positive siblings.
fn compile_and(node: &QueryNode, children: &[QueryNode]) -> QueryResult<Term> {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for child in children {
        match compile(child)? {
            Term::Unrestricted => {}
            Term::Positive(expression) => positives.push(expression),
            Term::Negative(expression) => negatives.push(expression),
        }
    }
    match (positives.is_empty(), negatives.is_empty()) {
        (true, true) => Ok(Term::Unrestricted),
        (true, false) => Err(unsupported_negation(node)),
        (false, true) => Ok(Term::Positive(join(positives, " AND "))),
        (false, false) => Ok(Term::Positive(format!(
            "({} NOT {})",
            join(positives, " AND "),
            disjunction(negatives)
        ))),
    }
}

/// Compiles an `OR`; any unrestricted branch makes the whole `OR` unrestricted.
fn compile_or(node: &QueryNode, children: &[QueryNode]) -> QueryResult<Term> {
    let mut branches = Vec::with_capacity(children.len());
    for child in children {
        match compile(child)? {
            Term::Unrestricted => return Ok(Term::Unrestricted),
            Term::Positive(expression) => branches.push(expression),
            Term::Negative(_) => return Err(unsupported_negation(node)),
        }
    }
    Ok(if branches.is_empty() { Term::Unrestricted } else { Term::Positive(disjunction(branches)) })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for the wildcard, bare or store-qualified.
fn is_wildcard(id: &str) -> bool {
    id == WILDCARD || id.rsplit_once(':').is_some_and(|(_, stream)| stream == WILDCARD)
}

/// Quotes an id as an FTS5 phrase of exactly one token.
fn phrase(id: &str) -> QueryResult<String> {
    if let Some(ch) = id.chars().find(|ch| !is_token_char(*ch)) {
        return Err(QueryError::malformed(
            format!("stream id `{id}` contains `{ch}`, which full-text search splits on"),
            &Value::String(id.to_string()),
        ));
    }
    Ok(format!("\"{id}\""))
}

/// Quotes every id and joins the phrases with `OR`.
fn phrases(ids: &BTreeSet<String>) -> QueryResult<String> {
    Ok(disjunction(ids.iter().map(|id| phrase(id)).collect::<QueryResult<_>>()?))
}

/// Returns true for characters [`FTS5_TOKENIZER`] keeps inside a token.
fn is_token_char(ch: char) -> bool {
    ch.is_alphanumeric() || FTS5_TOKEN_PUNCTUATION.contains(ch)
}

/// Joins expressions with `OR`.
fn disjunction(parts: Vec<String>) -> String {
    join(parts, " OR ")
}

/// Joins expressions, parenthesizing when there are several.
fn join(mut parts: Vec<String>, separator: &str) -> String {
    if parts.len() == 1 {
        return parts.pop().unwrap_or_default();
    }
    format!("({})", parts.join(separator))
}

/// Builds the error for a negation without positive terms.
fn unsupported_negation(node: &QueryNode) -> QueryError {
    QueryError::malformed(
        "a negation must be combined with at least one positive stream for full-text search",
        &node.to_json(),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
