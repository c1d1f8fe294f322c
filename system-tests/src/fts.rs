// system-tests/src/fts.rs
// ============================================================================
// Module: FTS5 Event Index
// Description: In-memory SQLite FTS5 table of events and their stream ids.
// Purpose: Execute compiled full-text filters against a real FTS5 engine.
// Dependencies: rusqlite, stream-query, crate::corpus
// ============================================================================

//! ## Overview
//! Each event is one row; its stream ids are stored space-separated in an
//! indexed column tokenized with [`FTS5_TOKENIZER`], so every stream id is a
//! single token. Queries render a [`FullTextFilter`] as a SQL clause over that
//! column and return the matching event ids.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use rusqlite::Connection;
use stream_query::FTS5_TOKENIZER;
use stream_query::FullTextFilter;

use crate::corpus::Event;

/// Indexed column holding space-separated stream ids.
pub const STREAM_IDS_COLUMN: &str = "stream_ids";

/// FTS5 event table.
pub struct FtsEventIndex {
    /// In-memory database connection.
    conn: Connection,
}

impl FtsEventIndex {
    /// Creates an empty in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`rusqlite::Error`] when the FTS5 table cannot be created.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE events USING fts5(event_id UNINDEXED, {STREAM_IDS_COLUMN}, \
             tokenize = \"{FTS5_TOKENIZER}\");"
        ))?;
        Ok(Self {
            conn,
        })
    }

    /// Creates an index holding the given events.
    ///
    /// # Errors
    ///
    /// Returns [`rusqlite::Error`] when the table cannot be created or filled.
    pub fn with_events(events: &[Event]) -> rusqlite::Result<Self> {
        let index = Self::open_in_memory()?;
        for event in events {
            index.insert(event)?;
        }
        Ok(index)
    }

    /// Inserts one event.
    ///
    /// # Errors
    ///
    /// Returns [`rusqlite::Error`] when the insert fails.
    pub fn insert(&self, event: &Event) -> rusqlite::Result<()> {
        self.conn.execute(
            &format!("INSERT INTO events (event_id, {STREAM_IDS_COLUMN}) VALUES (?1, ?2)"),
            (&event.id, event.stream_ids.join(" ")),
        )?;
        Ok(())
    }

    /// Returns the ids of events matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`rusqlite::Error`] when FTS5 rejects the expression.
    pub fn matching(&self, filter: &FullTextFilter) -> rusqlite::Result<BTreeSet<String>> {
        let sql = format!(
            "SELECT event_id FROM events WHERE {}",
            filter.to_sql_clause(STREAM_IDS_COLUMN)
        );
        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect()
    }
}
