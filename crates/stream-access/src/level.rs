// crates/stream-access/src/level.rs
// ============================================================================
// Module: Permission Levels
// Description: Ordered permission levels with the create-only special case.
// Purpose: Answer read, contribute and manage checks for a resolved level.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Levels rank `read < {create-only, contribute} < manage`. `create-only` and
//! `contribute` share a rank and are not comparable: when both are granted on
//! the same stream or tag, the earlier grant is kept. `create-only` allows
//! event creation but neither reading nor updating, so those checks
//! special-case it instead of comparing ranks.

use serde::Deserialize;
use serde::Serialize;

/// Permission level granted on a stream or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionLevel {
    /// Read events.
    Read,
    /// Create events without reading them.
    CreateOnly,
    /// Read, create and update events.
    Contribute,
    /// Full control, including child streams.
    Manage,
}

impl PermissionLevel {
    /// Returns the wire label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::CreateOnly => "create-only",
            Self::Contribute => "contribute",
            Self::Manage => "manage",
        }
    }

    /// Returns the rank used to keep the highest grant.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::CreateOnly | Self::Contribute => 1,
            Self::Manage => 2,
        }
    }

    /// Returns true when `self` outranks `other`; siblings of one rank never do.
    #[must_use]
    pub const fn outranks(self, other: Self) -> bool {
        self.rank() > other.rank()
    }

    /// Returns true when events may be read.
    #[must_use]
    pub const fn can_read(self) -> bool {
        !matches!(self, Self::CreateOnly)
    }

    /// Returns true when events may be created.
    #[must_use]
    pub const fn can_create(self) -> bool {
        matches!(self, Self::CreateOnly | Self::Contribute | Self::Manage)
    }

    /// Returns true when events may be updated.
    #[must_use]
    pub const fn can_update(self) -> bool {
        matches!(self, Self::Contribute | Self::Manage)
    }

    /// Returns true when the stream itself may be managed.
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Manage)
    }
}
