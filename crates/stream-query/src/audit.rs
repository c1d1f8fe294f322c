// crates/stream-query/src/audit.rs
// ============================================================================
// Module: Stream Query Audit Logging
// Description: Structured audit events for query resolution and access indexing.
// Purpose: Emit JSON-line events without a hard dependency on a log pipeline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Events are plain serializable structs built through `*Params` inputs so
//! every event carries a consistent `timestamp_ms`. Sinks decide where events
//! go: stderr, an append-only file, or nowhere. Events never contain stream
//! ids the caller was not allowed to read; only counts are recorded for those.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of a query resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The query resolved (possibly to "match nothing").
    Resolved,
    /// The query was rejected with an error.
    Rejected,
}

/// Query resolution audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Resolution outcome.
    pub outcome: QueryOutcome,
    /// Error class label when rejected.
    pub error_kind: Option<&'static str>,
    /// Number of distinct identifiers in the submitted query.
    pub identifier_count: usize,
    /// Number of identifiers dropped as non-authorized.
    pub non_authorized_count: usize,
    /// Stores referenced by the resolved query.
    pub stores: Vec<String>,
    /// True when the resolved query matches nothing.
    pub matches_nothing: bool,
}

/// Inputs required to construct a query audit event.
pub struct QueryAuditEventParams {
    /// Resolution outcome.
    pub outcome: QueryOutcome,
    /// Error class label when rejected.
    pub error_kind: Option<&'static str>,
    /// Number of distinct identifiers in the submitted query.
    pub identifier_count: usize,
    /// Number of identifiers dropped as non-authorized.
    pub non_authorized_count: usize,
    /// Stores referenced by the resolved query.
    pub stores: Vec<String>,
    /// True when the resolved query matches nothing.
    pub matches_nothing: bool,
}

impl QueryAuditEvent {
    /// Creates a new query audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: QueryAuditEventParams) -> Self {
        Self {
            event: "stream_query",
            timestamp_ms: now_ms(),
            outcome: params.outcome,
            error_kind: params.error_kind,
            identifier_count: params.identifier_count,
            non_authorized_count: params.non_authorized_count,
            stores: params.stores,
            matches_nothing: params.matches_nothing,
        }
    }
}

/// Permission index build audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AccessAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Access identifier.
    pub access_id: String,
    /// Access kind label.
    pub access_kind: &'static str,
    /// Number of stream permissions indexed.
    pub stream_permissions: usize,
    /// Number of tag permissions indexed.
    pub tag_permissions: usize,
    /// Number of feature permissions indexed.
    pub feature_permissions: usize,
    /// True when the implicit self-audit grant was added.
    pub self_audit_granted: bool,
}

/// Inputs required to construct an access audit event.
pub struct AccessAuditEventParams {
    /// Access identifier.
    pub access_id: String,
    /// Access kind label.
    pub access_kind: &'static str,
    /// Number of stream permissions indexed.
    pub stream_permissions: usize,
    /// Number of tag permissions indexed.
    pub tag_permissions: usize,
    /// Number of feature permissions indexed.
    pub feature_permissions: usize,
    /// True when the implicit self-audit grant was added.
    pub self_audit_granted: bool,
}

impl AccessAuditEvent {
    /// Creates a new access audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: AccessAuditEventParams) -> Self {
        Self {
            event: "access_index",
            timestamp_ms: now_ms(),
            access_id: params.access_id,
            access_kind: params.access_kind,
            stream_permissions: params.stream_permissions,
            tag_permissions: params.tag_permissions,
            feature_permissions: params.feature_permissions,
            self_audit_granted: params.self_audit_granted,
        }
    }
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for stream query events.
pub trait QueryAuditSink: Send + Sync {
    /// Records a query resolution event.
    fn record(&self, event: &QueryAuditEvent);

    /// Records a permission index build event.
    fn record_access(&self, _event: &AccessAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl QueryAuditSink for StderrAuditSink {
    fn record(&self, event: &QueryAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }

    fn record_access(&self, event: &AccessAuditEvent) {
        write_json_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_json_line(&mut *file, event);
            let _ = file.flush();
        }
    }
}

impl QueryAuditSink for FileAuditSink {
    fn record(&self, event: &QueryAuditEvent) {
        self.append(event);
    }

    fn record_access(&self, event: &AccessAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl QueryAuditSink for NoopAuditSink {
    fn record(&self, _event: &QueryAuditEvent) {}
}

/// Serializes an event and writes it as one line; failures are dropped.
fn write_json_line<W: Write, T: Serialize>(out: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(out, "{payload}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
