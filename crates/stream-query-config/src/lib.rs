// crates/stream-query-config/src/lib.rs
// ============================================================================
// Module: Stream Query Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for stream-query.toml semantics.
// Dependencies: serde, stream-access, stream-query, toml
// ============================================================================

//! ## Overview
//! `stream-query-config` defines the configuration model for stream query
//! deployments: query limits, known stores, access policy and the audit sink.
//! Validation is strict and fail-closed; builders produce the runtime values
//! used by `stream-query` and `stream-access`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
