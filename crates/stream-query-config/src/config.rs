// crates/stream-query-config/src/config.rs
// ============================================================================
// Module: Stream Query Configuration
// Description: Configuration loading and validation for stream query services.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, stream-access, stream-query, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is valid. Missing or invalid
//! configuration fails closed. Builders turn the validated model into the
//! runtime values consumed by `stream-query` and `stream-access`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use stream_access::AccessIndexCache;
use stream_access::AccessPolicy;
use stream_query::FileAuditSink;
use stream_query::NoopAuditSink;
use stream_query::QueryAuditSink;
use stream_query::QueryLimits;
use stream_query::StderrAuditSink;
use stream_query::StoreCatalog;
use stream_query::StoreId;
use stream_query::StreamQueryResolver;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stream-query.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STREAM_QUERY_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum configurable query nesting depth.
pub const MAX_QUERY_DEPTH: usize = 256;
/// Maximum configurable identifier count per query.
pub const MAX_QUERY_IDENTIFIERS: usize = 100_000;
/// Maximum number of extra stores.
pub const MAX_EXTRA_STORES: usize = 64;
/// Maximum length of a store name.
pub const MAX_STORE_NAME_LENGTH: usize = 64;
/// Maximum access index cache capacity.
pub const MAX_CACHE_CAPACITY: usize = 1_000_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamQueryConfig {
    /// Query input limits.
    #[serde(default)]
    pub query: QueryConfig,
    /// Stores known to the deployment.
    #[serde(default)]
    pub stores: StoresConfig,
    /// Access permission settings.
    #[serde(default)]
    pub access: AccessConfig,
    /// Audit event sink.
    #[serde(default)]
    pub audit_log: AuditLogConfig,
}

impl StreamQueryConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.query.validate()?;
        self.stores.validate()?;
        self.access.validate()?;
        self.audit_log.validate()
    }

    /// Returns the query input limits.
    #[must_use]
    pub const fn query_limits(&self) -> QueryLimits {
        QueryLimits {
            max_depth: self.query.max_depth,
            max_identifiers: self.query.max_identifiers,
        }
    }

    /// Returns the catalog of built-in plus configured stores.
    #[must_use]
    pub fn store_catalog(&self) -> StoreCatalog {
        self.stores
            .extra
            .iter()
            .fold(StoreCatalog::new(), |catalog, store| catalog.with_store(StoreId::new(store.as_str())))
    }

    /// Returns the access policy.
    #[must_use]
    pub const fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            audit_enabled: self.access.audit_enabled,
        }
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn QueryAuditSink>, ConfigError> {
        match (self.audit_log.sink, &self.audit_log.path) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit_log.path is required for the file sink".to_string()))
            }
        }
    }

    /// Builds a query resolver wired to the configured limits, stores and sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit sink cannot be opened.
    pub fn query_resolver(&self) -> Result<StreamQueryResolver, ConfigError> {
        Ok(StreamQueryResolver::new(self.query_limits(), self.store_catalog())
            .with_audit_sink(self.build_audit_sink()?))
    }

    /// Builds the access index cache wired to the configured policy and sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the audit sink cannot be opened.
    pub fn access_cache(&self) -> Result<AccessIndexCache, ConfigError> {
        Ok(AccessIndexCache::new(self.access.cache_capacity, self.access_policy())
            .with_audit_sink(self.build_audit_sink()?))
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Query input limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Maximum nesting depth of arrays and objects.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of identifiers per query.
    #[serde(default = "default_max_identifiers")]
    pub max_identifiers: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_identifiers: default_max_identifiers(),
        }
    }
}

impl QueryConfig {
    /// Validates query limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 || self.max_depth > MAX_QUERY_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "query.max_depth must be between 1 and {MAX_QUERY_DEPTH}"
            )));
        }
        if self.max_identifiers == 0 || self.max_identifiers > MAX_QUERY_IDENTIFIERS {
            return Err(ConfigError::Invalid(format!(
                "query.max_identifiers must be between 1 and {MAX_QUERY_IDENTIFIERS}"
            )));
        }
        Ok(())
    }
}

/// Stores known to the deployment besides the built-in ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoresConfig {
    /// Extra store names.
    #[serde(default)]
    pub extra: Vec<String>,
}

impl StoresConfig {
    /// Validates store names.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.extra.len() > MAX_EXTRA_STORES {
            return Err(ConfigError::Invalid("too many extra stores".to_string()));
        }
        let mut seen = BTreeSet::new();
        for store in &self.extra {
            validate_store_name(store)?;
            if !seen.insert(store.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate store `{store}`")));
            }
        }
        Ok(())
    }
}

/// Access permission settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Grant non-personal accesses read on their own audit stream.
    #[serde(default)]
    pub audit_enabled: bool,
    /// Maximum number of cached permission index keys; zero disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            audit_enabled: false,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl AccessConfig {
    /// Validates access settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(ConfigError::Invalid("access.cache_capacity too large".to_string()));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Drop audit events.
    None,
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Audit event sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditLogConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditLogConfig {
    /// Validates audit sink configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit_log.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit_log.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit_log.path requires sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening sinks.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path.components().any(|component| {
        component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH
    }) {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed).components().any(|component| {
        component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH
    }) {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}

/// Validates a store name: ASCII alphanumerics, `-` and `_`.
fn validate_store_name(store: &str) -> Result<(), ConfigError> {
    if store.is_empty() || store.len() > MAX_STORE_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "store names must be 1 to {MAX_STORE_NAME_LENGTH} characters"
        )));
    }
    if !store.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
        return Err(ConfigError::Invalid(format!("store `{store}` contains invalid characters")));
    }
    Ok(())
}

/// Default query nesting depth.
fn default_max_depth() -> usize {
    QueryLimits::default().max_depth
}

/// Default identifier count per query.
fn default_max_identifiers() -> usize {
    QueryLimits::default().max_identifiers
}

/// Default access index cache capacity.
const fn default_cache_capacity() -> usize {
    1024
}

// ============================================================================
// SECTION: Tests
// ============================================================================
