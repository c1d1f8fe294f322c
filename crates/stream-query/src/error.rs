// crates/stream-query/src/error.rs
// ============================================================================
// Module: Stream Query Errors
// Description: Structured diagnostics for stream query resolution.
// Purpose: Classify failures as request structure, unknown references, or internal faults.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every stage of the query pipeline reports failures through [`QueryError`].
//! Structural and reference errors carry the offending fragment so the caller
//! can echo it back; unauthorized identifiers are never errors and never reach
//! this module.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Error Classes
// ============================================================================

/// Coarse classification of a query failure for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The request shape is malformed (4xx).
    InvalidRequestStructure,
    /// A referenced store or stream does not exist at all (4xx).
    UnknownReferencedResource,
    /// Internal fault that indicates a pipeline bug (5xx).
    Internal,
}

impl ErrorClass {
    /// Returns the stable label used in audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvalidRequestStructure => "invalid_request_structure",
            Self::UnknownReferencedResource => "unknown_referenced_resource",
            Self::Internal => "internal",
        }
    }
}

// ============================================================================
// SECTION: Query Errors
// ============================================================================

/// Errors raised while resolving a stream query.
///
/// # Invariants
/// - `fragment` is the JSON-stringified sub-query that triggered the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Wrong arity or type, unknown operator, wildcard misuse, mixed stores.
    #[error("malformed stream query: {message} (in {fragment})")]
    MalformedQuery {
        /// Violated constraint.
        message: String,
        /// Offending sub-query.
        fragment: String,
    },
    /// A named store or stream cannot be resolved to any known entity.
    #[error("unknown referenced resource: {message} (in {fragment})")]
    UnknownReference {
        /// Description of the missing resource.
        message: String,
        /// Offending sub-query.
        fragment: String,
    },
    /// The expansion oracle failed.
    #[error("stream expansion failed: {0}")]
    Expansion(String),
    /// A canonical tree broke an optimizer post-condition.
    #[error("query invariant violated: {0}")]
    InvariantViolation(String),
}

impl QueryError {
    /// Builds a malformed-query error for the given fragment.
    pub fn malformed(message: impl Into<String>, fragment: &Value) -> Self {
        Self::MalformedQuery {
            message: message.into(),
            fragment: fragment.to_string(),
        }
    }

    /// Builds a malformed-query error from an already rendered fragment.
    pub fn malformed_text(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::MalformedQuery {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    /// Builds an unknown-reference error from a rendered fragment.
    pub fn unknown_reference(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::UnknownReference {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    /// Returns the coarse class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedQuery {
                ..
            } => ErrorClass::InvalidRequestStructure,
            Self::UnknownReference {
                ..
            } => ErrorClass::UnknownReferencedResource,
            Self::Expansion(_) | Self::InvariantViolation(_) => ErrorClass::Internal,
        }
    }

    /// Returns a caller-facing message; internal details are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedQuery {
                message,
                fragment,
            } => format!("Invalid streams query {fragment}: {message}"),
            Self::UnknownReference {
                message,
                ..
            } => format!("Unknown referenced resource: {message}"),
            Self::Expansion(_) | Self::InvariantViolation(_) => {
                "An internal error occurred while resolving the streams query".to_string()
            }
        }
    }
}

/// Convenient result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
