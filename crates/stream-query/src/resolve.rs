// crates/stream-query/src/resolve.rs
// ============================================================================
// Module: Stream Query Resolver
// Description: Entry point running the full query pipeline.
// Purpose: Normalize, validate, expand and optimize a raw query, then expose
//          per-store views of the canonical result.
// Dependencies: serde_json, crate::{audit, error, expand, identifiers,
//               interfaces, normalize, optimize, query, schema}
// ============================================================================

//! ## Overview
//! [`StreamQueryResolver::resolve`] runs every stage in order:
//! normalize, validate (with the authorization oracle), expand (with the
//! expansion oracle), optimize, verify. The pipeline can also be split in
//! two: [`StreamQueryResolver::prepare`] runs the synchronous normalizer so a
//! caller can inspect [`PreparedQuery::stream_refs`] (for example to load
//! permissions asynchronously) before [`StreamQueryResolver::complete`] runs
//! the rest. Each resolution records exactly one audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::audit::NoopAuditSink;
use crate::audit::QueryAuditEvent;
use crate::audit::QueryAuditEventParams;
use crate::audit::QueryAuditSink;
use crate::audit::QueryOutcome;
use crate::error::QueryResult;
use crate::expand::expand;
use crate::identifiers::StoreCatalog;
use crate::identifiers::StoreId;
use crate::identifiers::StreamRef;
use crate::interfaces::StreamAuthorizer;
use crate::interfaces::StreamExpander;
use crate::normalize::QueryLimits;
use crate::normalize::normalize;
use crate::normalize::parse_param;
use crate::optimize::optimize;
use crate::optimize::optimize_option;
use crate::optimize::verify_canonical;
use crate::query::Expr;
use crate::query::QueryNode;
use crate::schema::validate;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Runs the stream query pipeline with fixed limits and a store catalog.
#[derive(Clone)]
pub struct StreamQueryResolver {
    /// Bounds applied to raw input.
    limits: QueryLimits,
    /// Stores known to the deployment.
    stores: StoreCatalog,
    /// Audit sink for resolution events.
    audit: Arc<dyn QueryAuditSink>,
}

impl StreamQueryResolver {
    /// Creates a resolver that does not record audit events.
    #[must_use]
    pub fn new(limits: QueryLimits, stores: StoreCatalog) -> Self {
        Self {
            limits,
            stores,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Returns the resolver with the given audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn QueryAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Returns the store catalog.
    #[must_use]
    pub const fn stores(&self) -> &StoreCatalog {
        &self.stores
    }

    /// Normalizes a raw query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedQuery`](crate::QueryError::MalformedQuery)
    /// for unsupported shapes or exceeded limits.
    pub fn prepare(&self, raw: &Value) -> QueryResult<PreparedQuery> {
        match normalize(raw, &self.limits) {
            Ok(expr) => Ok(PreparedQuery {
                expr,
            }),
            Err(err) => {
                self.record_rejection(0, err.class().label());
                Err(err)
            }
        }
    }

    /// Normalizes a query passed as a query-string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedQuery`](crate::QueryError::MalformedQuery)
    /// for invalid JSON text or unsupported shapes.
    pub fn prepare_param(&self, text: &str) -> QueryResult<PreparedQuery> {
        match parse_param(text) {
            Ok(raw) => self.prepare(&raw),
            Err(err) => {
                self.record_rejection(0, err.class().label());
                Err(err)
            }
        }
    }

    /// Validates, expands and optimizes a prepared query.
    ///
    /// # Errors
    ///
    /// Returns any validation, expansion or invariant error.
    pub async fn complete<E, A>(
        &self,
        prepared: PreparedQuery,
        expander: &E,
        authorizer: &A,
    ) -> QueryResult<ResolvedQuery>
    where
        E: StreamExpander + ?Sized,
        A: StreamAuthorizer + ?Sized,
    {
        let identifier_count = prepared.identifiers().len();
        match self.run(prepared, expander, authorizer).await {
            Ok(resolved) => {
                self.audit.record(&QueryAuditEvent::new(QueryAuditEventParams {
                    outcome: QueryOutcome::Resolved,
                    error_kind: None,
                    identifier_count,
                    non_authorized_count: resolved.non_authorized_streams.len(),
                    stores: resolved.stores().iter().map(ToString::to_string).collect(),
                    matches_nothing: resolved.query.is_none(),
                }));
                Ok(resolved)
            }
            Err(err) => {
                self.record_rejection(identifier_count, err.class().label());
                Err(err)
            }
        }
    }

    /// Resolves a raw query end to end.
    ///
    /// # Errors
    ///
    /// Returns any normalization, validation, expansion or invariant error.
    pub async fn resolve<E, A>(
        &self,
        raw: &Value,
        expander: &E,
        authorizer: &A,
    ) -> QueryResult<ResolvedQuery>
    where
        E: StreamExpander + ?Sized,
        A: StreamAuthorizer + ?Sized,
    {
        let prepared = self.prepare(raw)?;
        self.complete(prepared, expander, authorizer).await
    }

    /// Runs the stages after normalization.
    async fn run<E, A>(
        &self,
        prepared: PreparedQuery,
        expander: &E,
        authorizer: &A,
    ) -> QueryResult<ResolvedQuery>
    where
        E: StreamExpander + ?Sized,
        A: StreamAuthorizer + ?Sized,
    {
        let validated = validate(prepared.expr, &self.stores, authorizer)?;
        let expanded = match validated.expr {
            Some(expr) => expand(expr, expander).await?,
            None => None,
        };
        let query = optimize_option(expanded);
        if let Some(query) = &query {
            verify_canonical(query)?;
        }
        Ok(ResolvedQuery {
            query,
            non_authorized_streams: validated.non_authorized,
        })
    }

    /// Records a rejected resolution.
    fn record_rejection(&self, identifier_count: usize, error_kind: &'static str) {
        self.audit.record(&QueryAuditEvent::new(QueryAuditEventParams {
            outcome: QueryOutcome::Rejected,
            error_kind: Some(error_kind),
            identifier_count,
            non_authorized_count: 0,
            stores: Vec::new(),
            matches_nothing: true,
        }));
    }
}

impl Default for StreamQueryResolver {
    fn default() -> Self {
        Self::new(QueryLimits::default(), StoreCatalog::default())
    }
}

// ============================================================================
// SECTION: Prepared Queries
// ============================================================================

/// Normalized query awaiting validation and expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Normalized expression, `None` when it matches nothing.
    expr: Option<Expr<String>>,
}

impl PreparedQuery {
    /// Returns the normalized expression.
    #[must_use]
    pub const fn expr(&self) -> Option<&Expr<String>> {
        self.expr.as_ref()
    }

    /// Returns every raw identifier, exclusions included.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.expr
            .as_ref()
            .map(|expr| expr.identifiers().into_iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the identifiers that parse as stream references.
    ///
    /// Unparseable identifiers are skipped; validation reports them later.
    #[must_use]
    pub fn stream_refs(&self) -> BTreeSet<StreamRef> {
        self.identifiers().into_iter().filter_map(|id| StreamRef::parse(id).ok()).collect()
    }
}

// ============================================================================
// SECTION: Resolved Queries
// ============================================================================

/// Canonical query plus the identifiers removed by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Canonical tree over qualified ids, `None` when nothing can match.
    pub query: Option<QueryNode>,
    /// Qualified identifiers the caller may not read.
    pub non_authorized_streams: BTreeSet<String>,
}

impl ResolvedQuery {
    /// Returns the stores referenced by the canonical tree.
    #[must_use]
    pub fn stores(&self) -> BTreeSet<StoreId> {
        self.query
            .as_ref()
            .map(|query| {
                query
                    .identifiers()
                    .into_iter()
                    .filter_map(|id| StreamRef::parse(id).ok())
                    .map(|stream| stream.store)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Restricts the tree to one store with store-local ids.
    ///
    /// Leaves of other stores are dropped, negations included, and the result
    /// is re-optimized. `None` means nothing in this store can match.
    #[must_use]
    pub fn for_store(&self, store: &StoreId) -> Option<QueryNode> {
        self.query.as_ref().and_then(|query| restrict(query, store)).and_then(optimize)
    }
}

/// Keeps the leaves of one store, stripping their store prefix.
fn restrict(node: &QueryNode, store: &StoreId) -> Option<QueryNode> {
    let local = |id: &str| StreamRef::parse(id).ok().filter(|stream| &stream.store == store);
    let local_set = |ids: &BTreeSet<String>| {
        ids.iter().filter_map(|id| local(id)).map(|stream| stream.stream).collect::<BTreeSet<_>>()
    };
    match node {
        QueryNode::Equal(id) => local(id).map(|stream| QueryNode::Equal(stream.stream)),
        QueryNode::NotEqual(id) => local(id).map(|stream| QueryNode::NotEqual(stream.stream)),
        QueryNode::In(ids) => Some(QueryNode::In(local_set(ids))),
        QueryNode::NotIn(ids) => Some(QueryNode::NotIn(local_set(ids))),
        QueryNode::And(children) => {
            Some(QueryNode::And(children.iter().filter_map(|child| restrict(child, store)).collect()))
        }
        QueryNode::Or(children) => {
            Some(QueryNode::Or(children.iter().filter_map(|child| restrict(child, store)).collect()))
        }
    }
}
