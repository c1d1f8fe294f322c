// crates/stream-access/src/access.rs
// ============================================================================
// Module: Accesses
// Description: Immutable access values and their permission records.
// Purpose: Model the wire shape of accesses and the deployment access policy.
// Dependencies: serde, serde_json, crate::level
// ============================================================================

//! ## Overview
//! An [`Access`] is an immutable credential: who it belongs to, what kind it
//! is and which [`PermissionRecord`]s it carries. Records address a stream, a
//! tag or a feature; stream ids use the surface syntax (`:<store>:<id>` or
//! the legacy `.` prefix). Accesses are never mutated after construction;
//! derived permission state lives in
//! [`AccessPermissionIndex`](crate::AccessPermissionIndex).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::level::PermissionLevel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Feature controlling the implicit read grant on the access's own audit stream.
pub const FEATURE_SELF_AUDIT: &str = "selfAudit";
/// Feature controlling whether an access may delete itself.
pub const FEATURE_SELF_REVOKE: &str = "selfRevoke";
/// Feature setting that disables a feature.
pub const SETTING_FORBIDDEN: &str = "forbidden";

// ============================================================================
// SECTION: Access Kinds
// ============================================================================

/// Kind of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// The account owner's own session; implicitly manages everything.
    Personal,
    /// Application access requested by a third party app.
    App,
    /// Access shared with another person.
    Shared,
}

impl AccessKind {
    /// Returns the wire label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::App => "app",
            Self::Shared => "shared",
        }
    }
}

// ============================================================================
// SECTION: Permission Records
// ============================================================================

/// Per-method restrictions attached to a permission (method name to payload).
pub type Limitations = BTreeMap<String, Value>;

/// One permission carried by an access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRecord {
    /// Grant on a stream and its descendants.
    Stream {
        /// Stream id in surface syntax; `*` addresses every stream of a store.
        #[serde(rename = "streamId")]
        stream_id: String,
        /// Granted level.
        level: PermissionLevel,
        /// Per-method restrictions.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        limitations: Limitations,
    },
    /// Grant on events carrying a tag.
    Tag {
        /// Tag, or `*` for every tag.
        tag: String,
        /// Granted level.
        level: PermissionLevel,
        /// Per-method restrictions.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        limitations: Limitations,
    },
    /// Feature switch.
    Feature {
        /// Feature name.
        feature: String,
        /// Feature setting, such as `forbidden`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        setting: Option<String>,
        /// Level attached to the feature, when the feature is level-based.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<PermissionLevel>,
        /// Per-method restrictions.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        limitations: Limitations,
    },
}

impl PermissionRecord {
    /// Builds a stream grant without limitations.
    #[must_use]
    pub fn stream(stream_id: impl Into<String>, level: PermissionLevel) -> Self {
        Self::Stream {
            stream_id: stream_id.into(),
            level,
            limitations: Limitations::new(),
        }
    }

    /// Builds a tag grant without limitations.
    #[must_use]
    pub fn tag(tag: impl Into<String>, level: PermissionLevel) -> Self {
        Self::Tag {
            tag: tag.into(),
            level,
            limitations: Limitations::new(),
        }
    }

    /// Builds a feature setting.
    #[must_use]
    pub fn feature(feature: impl Into<String>, setting: impl Into<String>) -> Self {
        Self::Feature {
            feature: feature.into(),
            setting: Some(setting.into()),
            level: None,
            limitations: Limitations::new(),
        }
    }

    /// Returns the per-method restrictions of the record.
    #[must_use]
    pub const fn limitations(&self) -> &Limitations {
        match self {
            Self::Stream {
                limitations, ..
            }
            | Self::Tag {
                limitations, ..
            }
            | Self::Feature {
                limitations, ..
            } => limitations,
        }
    }
}

// ============================================================================
// SECTION: Accesses
// ============================================================================

/// Immutable access credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    /// Access identifier.
    pub id: String,
    /// Bearer token.
    pub token: String,
    /// Owning user.
    pub user_id: String,
    /// Access kind.
    #[serde(rename = "type")]
    pub kind: AccessKind,
    /// Display name.
    pub name: String,
    /// Permission records; personal accesses carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<PermissionRecord>>,
}

impl Access {
    /// Returns true for the account owner's personal access.
    #[must_use]
    pub fn is_personal(&self) -> bool {
        self.kind == AccessKind::Personal
    }

    /// Returns the qualified id of the access's own audit stream.
    #[must_use]
    pub fn audit_stream_id(&self) -> String {
        format!(":{}:access-{}", stream_query::AUDIT_STORE, self.id)
    }

    /// Returns true when the access explicitly forbids the feature.
    #[must_use]
    pub fn forbids_feature(&self, name: &str) -> bool {
        self.permissions.iter().flatten().any(|record| {
            matches!(
                record,
                PermissionRecord::Feature { feature, setting: Some(setting), .. }
                    if feature == name && setting == SETTING_FORBIDDEN
            )
        })
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Deployment-wide inputs to permission resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Grants every non-personal access read on its own audit stream.
    pub audit_enabled: bool,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
