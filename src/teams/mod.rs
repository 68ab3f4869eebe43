//! Team membership and per-team permission storage.

mod membership_store;
mod permission_set;
mod permission_store;
mod repository;
mod types;

pub use membership_store::TeamMembershipStore;
pub use permission_set::{PermissionEntry, PermissionSet};
pub use permission_store::{TeamPermissionStore, can_manage_role};
pub use repository::{
    CreateGrant, CreateMembership, TeamMembershipRepository, TeamPermissionRepository,
};
pub use types::{PermissionGrant, TeamId, TeamMembership, UserId};
pub(crate) use types::{sort_grants, sort_memberships};
