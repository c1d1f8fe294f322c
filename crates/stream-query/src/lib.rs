// crates/stream-query/src/lib.rs
// ============================================================================
// Module: Stream Query Root
// Description: Public API surface for stream query resolution.
// Purpose: Wire together the pipeline stages, collaborator seams and compilers.
// Dependencies: crate::{audit, compile, error, expand, identifiers, interfaces,
//              memory, normalize, optimize, query, resolve, schema}
// ============================================================================

//! ## Overview
//! Clients filter events with a boolean expression over stream identifiers.
//! This crate turns every accepted surface syntax into a canonical tree:
//!
//! 1. [`normalize()`] removes sugar and builds the closed [`Expr`] operator set;
//! 2. [`validate`] checks identifiers and gates them through a
//!    [`StreamAuthorizer`];
//! 3. [`expand()`] replaces expansion operators with descendant closures from a
//!    [`StreamExpander`];
//! 4. [`optimize()`] canonicalizes the resulting [`QueryNode`] tree;
//! 5. the [`compile`] module emits document-store and full-text filters.
//!
//! [`StreamQueryResolver`] runs the whole pipeline.
//!
//! ```
//! use serde_json::json;
//! use stream_query::AllowAll;
//! use stream_query::InMemoryStreamTree;
//! use stream_query::QueryNode;
//! use stream_query::StoreId;
//! use stream_query::StreamQueryResolver;
//!
//! let local = StoreId::local();
//! let tree = InMemoryStreamTree::new()
//!     .with_stream(&local, "A", None)
//!     .with_stream(&local, "B", Some("A"));
//! let resolver = StreamQueryResolver::default();
//! let resolved =
//!     futures::executor::block_on(resolver.resolve(&json!("A"), &tree, &AllowAll)).unwrap();
//! assert_eq!(resolved.query, Some(QueryNode::in_set(["A", "B"])));
//! ```

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod audit;
pub mod compile;
pub mod error;
pub mod expand;
pub mod identifiers;
pub mod interfaces;
pub mod memory;
pub mod normalize;
pub mod optimize;
pub mod query;
pub mod resolve;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AccessAuditEvent;
pub use audit::AccessAuditEventParams;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::QueryAuditEvent;
pub use audit::QueryAuditEventParams;
pub use audit::QueryAuditSink;
pub use audit::QueryOutcome;
pub use audit::StderrAuditSink;
pub use compile::DocumentFilterOptions;
pub use compile::FTS5_TOKEN_PUNCTUATION;
pub use compile::FTS5_TOKENIZER;
pub use compile::FullTextFilter;
pub use compile::STREAM_IDS_FIELD;
pub use compile::compile_document_filter;
pub use compile::compile_fulltext;
pub use error::ErrorClass;
pub use error::QueryError;
pub use error::QueryResult;
pub use expand::expand;
pub use identifiers::AUDIT_STORE;
pub use identifiers::ForbiddenChar;
pub use identifiers::LOCAL_STORE;
pub use identifiers::RESERVED_TAG_WILDCARD;
pub use identifiers::SYSTEM_STORE;
pub use identifiers::StoreCatalog;
pub use identifiers::StoreId;
pub use identifiers::StreamRef;
pub use identifiers::StreamRefError;
pub use identifiers::WILDCARD;
pub use identifiers::is_valid_for_creation;
pub use identifiers::validate_stream_id;
pub use interfaces::AllowAll;
pub use interfaces::ExpansionError;
pub use interfaces::StreamAuthorizer;
pub use interfaces::StreamExpander;
pub use memory::InMemoryStreamTree;
pub use normalize::QueryLimits;
pub use normalize::normalize;
pub use normalize::parse_param;
pub use optimize::optimize;
pub use optimize::optimize_option;
pub use optimize::verify_canonical;
pub use query::Expr;
pub use query::QueryNode;
pub use resolve::PreparedQuery;
pub use resolve::ResolvedQuery;
pub use resolve::StreamQueryResolver;
pub use schema::Operator;
pub use schema::Validated;
pub use schema::validate;
