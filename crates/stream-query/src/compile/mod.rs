// crates/stream-query/src/compile/mod.rs
// ============================================================================
// Module: Stream Query Backend Compilers
// Description: Translators from canonical trees to backend filter languages.
// Purpose: Group the document-store and full-text compilers.
// Dependencies: crate::query
// ============================================================================

//! ## Overview
//! Compilers consume an optimized, store-local [`QueryNode`](crate::QueryNode)
//! tree (`None` = match nothing) and emit a filter in the backend's language.
//! They never consult the oracles; every identifier they see has already been
//! validated, authorized and expanded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod document;
pub mod fulltext;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::DocumentFilterOptions;
pub use document::STREAM_IDS_FIELD;
pub use document::compile_document_filter;
pub use fulltext::FTS5_TOKEN_PUNCTUATION;
pub use fulltext::FTS5_TOKENIZER;
pub use fulltext::FullTextFilter;
pub use fulltext::compile_fulltext;
