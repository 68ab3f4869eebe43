use chrono::{DateTime, Utc};

use crate::catalog::TeamPermission;
use crate::roles::TeamRole;
use crate::teams::{TeamId, UserId};

/// Team membership and permission changes emitted by the engine.
///
/// Dispatched only after the mutation has been committed. Denied requests
/// produce no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamEvent {
    // membership
    MemberAdded {
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        at: DateTime<Utc>,
    },
    MemberRemoved {
        team_id: TeamId,
        user_id: UserId,
        /// Who removed them; equal to `user_id` when they left.
        by: UserId,
        at: DateTime<Utc>,
    },
    MemberRoleChanged {
        team_id: TeamId,
        user_id: UserId,
        from: TeamRole,
        to: TeamRole,
        by: UserId,
        at: DateTime<Utc>,
    },
    OwnershipTransferred {
        team_id: TeamId,
        from: UserId,
        to: UserId,
        at: DateTime<Utc>,
    },

    // permissions
    PermissionSet {
        team_id: TeamId,
        role: TeamRole,
        permission: TeamPermission,
        granted: bool,
        by: UserId,
        at: DateTime<Utc>,
    },
    PermissionReset {
        team_id: TeamId,
        role: TeamRole,
        permission: TeamPermission,
        by: UserId,
        at: DateTime<Utc>,
    },
    DefaultsInitialized {
        team_id: TeamId,
        rows_written: u64,
        at: DateTime<Utc>,
    },
}

impl TeamEvent {
    /// Dot-separated event name for logging and tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MemberAdded { .. } => "team.member.added",
            Self::MemberRemoved { .. } => "team.member.removed",
            Self::MemberRoleChanged { .. } => "team.member.role_changed",
            Self::OwnershipTransferred { .. } => "team.ownership.transferred",
            Self::PermissionSet { .. } => "team.permission.set",
            Self::PermissionReset { .. } => "team.permission.reset",
            Self::DefaultsInitialized { .. } => "team.permission.defaults_initialized",
        }
    }

    pub fn team_id(&self) -> &TeamId {
        match self {
            Self::MemberAdded { team_id, .. }
            | Self::MemberRemoved { team_id, .. }
            | Self::MemberRoleChanged { team_id, .. }
            | Self::OwnershipTransferred { team_id, .. }
            | Self::PermissionSet { team_id, .. }
            | Self::PermissionReset { team_id, .. }
            | Self::DefaultsInitialized { team_id, .. } => team_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MemberAdded { at, .. }
            | Self::MemberRemoved { at, .. }
            | Self::MemberRoleChanged { at, .. }
            | Self::OwnershipTransferred { at, .. }
            | Self::PermissionSet { at, .. }
            | Self::PermissionReset { at, .. }
            | Self::DefaultsInitialized { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let now = Utc::now();
        let team = TeamId::new("T1");

        assert_eq!(
            TeamEvent::MemberAdded {
                team_id: team.clone(),
                user_id: UserId::new("bob"),
                role: TeamRole::Member,
                at: now,
            }
            .name(),
            "team.member.added"
        );
        assert_eq!(
            TeamEvent::OwnershipTransferred {
                team_id: team.clone(),
                from: UserId::new("alice"),
                to: UserId::new("bob"),
                at: now,
            }
            .name(),
            "team.ownership.transferred"
        );
        assert_eq!(
            TeamEvent::DefaultsInitialized {
                team_id: team,
                rows_written: 32,
                at: now,
            }
            .name(),
            "team.permission.defaults_initialized"
        );
    }

    #[test]
    fn test_event_accessors() {
        let now = Utc::now();
        let event = TeamEvent::PermissionSet {
            team_id: TeamId::new("T1"),
            role: TeamRole::Admin,
            permission: TeamPermission::TeamInvite,
            granted: false,
            by: UserId::new("alice"),
            at: now,
        };

        assert_eq!(event.timestamp(), now);
        assert_eq!(event.team_id().as_str(), "T1");

        let debug_str = format!("{event:?}");
        assert!(debug_str.contains("PermissionSet"));
        assert!(debug_str.contains("TeamInvite"));
    }
}
