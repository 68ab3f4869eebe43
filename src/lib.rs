//! Team-scoped role-based access control.
//!
//! A user may belong to many teams and holds exactly one [`TeamRole`] in each.
//! What a role may do inside a team is decided by the [`PermissionCatalog`]
//! defaults, overridden per team through the [`TeamPermissionStore`].
//! The [`AuthorizationEngine`] answers the questions asked on every protected
//! request: may this user perform this permission in this team, and may this
//! manager change that member's role.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use teamgate::memory::{InMemoryTeamMembershipRepository, InMemoryTeamPermissionRepository};
//! use teamgate::{AuthorizationEngine, PermissionCatalog, TeamId, TeamPermission, UserId};
//!
//! let engine = AuthorizationEngine::new(
//!     InMemoryTeamMembershipRepository::new(),
//!     InMemoryTeamPermissionRepository::new(),
//!     Arc::new(PermissionCatalog::standard()),
//! );
//!
//! let team = TeamId::new("t1");
//! let alice = UserId::new("alice");
//! engine.found_team(&team, &alice).await?;
//!
//! let access = engine
//!     .require_permission(&alice, &team, TeamPermission::TeamManage)
//!     .await?;
//! assert!(access.role.is_owner());
//! ```

use serde::Serialize;
use thiserror::Error;

pub mod catalog;
pub mod config;
pub mod engine;
pub mod events;
pub mod memory;
pub mod roles;
pub mod teams;

#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use catalog::{PermissionCatalog, PermissionCatalogBuilder, PermissionDefinition, TeamPermission};
pub use config::{OwnershipConfig, RbacConfig};
pub use engine::{AuthorizationEngine, RoleManagement, TeamAccess};
pub use events::{TeamEvent, register_event_listeners};
pub use roles::{Authority, TeamRole};
pub use teams::{
    CreateGrant, CreateMembership, PermissionEntry, PermissionGrant, PermissionSet, TeamId,
    TeamMembership, TeamMembershipRepository, TeamMembershipStore, TeamPermissionRepository,
    TeamPermissionStore, UserId,
};

/// Errors produced by role resolution, permission checks and the stores.
///
/// Every variant is terminal for the operation that produced it; nothing
/// in this crate retries. Use [`RbacError::kind`] to map a failure to a
/// transport response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RbacError {
    #[error("user is not a member of this team")]
    NotATeamMember,
    #[error("target user is not a member of this team")]
    TargetNotMember,
    #[error("members cannot manage their own role")]
    SelfManagement,
    #[error("missing required team permission")]
    InsufficientPermission,
    #[error("team role is below the required minimum")]
    InsufficientRole,
    #[error("role does not outrank the target role")]
    InsufficientAuthority,
    #[error("unknown team role: {0}")]
    UnknownRole(String),
    #[error("unknown team permission: {0}")]
    UnknownPermission(String),
    #[error("user is not the team owner")]
    NotOwner,
    #[error("the team owner cannot leave or be removed; transfer ownership first")]
    LastOwner,
    #[error("user is already a member of this team")]
    AlreadyMember,
    #[error("the owner role can only change hands through an ownership transfer")]
    OwnershipTransferRequired,
    #[error("team not found")]
    TeamNotFound,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Coarse classification of an [`RbacError`] for boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Ordinary policy denial (4xx-class).
    Denied,
    /// Programmer or configuration error (500-class).
    Fatal,
    /// Storage fault; reads may be retried upstream.
    Unavailable,
}

impl RbacError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRole(_) | Self::UnknownPermission(_) | Self::InvalidConfig(_) => {
                ErrorKind::Fatal
            }
            Self::StoreUnavailable(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Denied,
        }
    }

    /// Returns true for policy denials.
    pub fn is_denial(&self) -> bool {
        self.kind() == ErrorKind::Denied
    }

    /// Returns true only for [`RbacError::StoreUnavailable`].
    ///
    /// Mutations must only be retried through idempotent upserts.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Stable snake_case code for this error, suitable for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotATeamMember => "not_a_team_member",
            Self::TargetNotMember => "target_not_member",
            Self::SelfManagement => "self_management",
            Self::InsufficientPermission => "insufficient_permission",
            Self::InsufficientRole => "insufficient_role",
            Self::InsufficientAuthority => "insufficient_authority",
            Self::UnknownRole(_) => "unknown_role",
            Self::UnknownPermission(_) => "unknown_permission",
            Self::NotOwner => "not_owner",
            Self::LastOwner => "last_owner",
            Self::AlreadyMember => "already_member",
            Self::OwnershipTransferRequired => "ownership_transfer_required",
            Self::TeamNotFound => "team_not_found",
            Self::InvalidConfig(_) => "invalid_config",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
