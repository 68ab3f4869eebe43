//! Core types for team membership and permission grants.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TeamPermission;
use crate::roles::TeamRole;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

opaque_id!(
    /// Opaque team identifier, validated upstream.
    TeamId
);

opaque_id!(
    /// Opaque identifier of an already-authenticated user.
    UserId
);

/// Links a user to a team with exactly one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: TeamRole,
    /// When the user joined the team.
    pub created_at: DateTime<Utc>,
    /// When the role last changed.
    pub updated_at: DateTime<Utc>,
}

/// An explicit per-team override of a catalog default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub team_id: TeamId,
    pub role: TeamRole,
    pub permission: TeamPermission,
    pub granted: bool,
    pub updated_at: DateTime<Utc>,
}

/// Sorts grants by role rank, then catalog order. Backends return rows in
/// this order so listings are stable.
pub(crate) fn sort_grants(grants: &mut [PermissionGrant]) {
    grants.sort_by_key(|g| {
        let position = TeamPermission::ALL.iter().position(|p| *p == g.permission);
        (g.role.rank(), position)
    });
}

/// Sorts memberships oldest first, ties broken by user id.
pub(crate) fn sort_memberships(memberships: &mut [TeamMembership]) {
    memberships.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}
