//! Storage traits for memberships and permission overrides.
//!
//! Implementations own the atomicity of every write that touches the
//! single-owner invariant: the ownership checks below run inside the same
//! lock or transaction as the write they guard.

use async_trait::async_trait;

use super::types::{PermissionGrant, TeamId, TeamMembership, UserId};
use crate::RbacError;
use crate::catalog::TeamPermission;
use crate::roles::TeamRole;

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: TeamRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateGrant {
    pub role: TeamRole,
    pub permission: TeamPermission,
    pub granted: bool,
}

#[async_trait]
pub trait TeamMembershipRepository: Send + Sync {
    async fn find_by_team_and_user(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMembership>, RbacError>;

    /// Members of a team, oldest first.
    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<TeamMembership>, RbacError>;

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<TeamMembership>, RbacError>;

    async fn find_owner(&self, team_id: &TeamId) -> Result<Option<TeamMembership>, RbacError>;

    /// Adds a member.
    ///
    /// Fails with `AlreadyMember` if the user has a membership, with
    /// `OwnershipTransferRequired` when adding an owner to a team that has
    /// one, and with `TeamNotFound` when adding a non-owner to a team with
    /// no owner.
    async fn create(&self, data: CreateMembership) -> Result<TeamMembership, RbacError>;

    /// Changes a non-owner member's role to another non-owner role.
    ///
    /// Fails with `TargetNotMember` if there is no membership and with
    /// `OwnershipTransferRequired` if either the current or the new role
    /// is `owner`.
    async fn update_role(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError>;

    /// Atomically demotes `from` to `successor` and promotes `to` to owner.
    ///
    /// Fails with `NotOwner` if `from` does not hold `owner` at the moment
    /// of the write and with `TargetNotMember` if `to` has no membership.
    async fn transfer_ownership(
        &self,
        team_id: &TeamId,
        from: &UserId,
        to: &UserId,
        successor: TeamRole,
    ) -> Result<(), RbacError>;

    /// Deletes a membership.
    ///
    /// Fails with `LastOwner` for the owner and `TargetNotMember` if there
    /// is no membership.
    async fn delete(&self, team_id: &TeamId, user_id: &UserId) -> Result<(), RbacError>;
}

#[async_trait]
pub trait TeamPermissionRepository: Send + Sync {
    async fn find_grant(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<Option<PermissionGrant>, RbacError>;

    async fn find_by_team_and_role(
        &self,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<Vec<PermissionGrant>, RbacError>;

    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<PermissionGrant>, RbacError>;

    /// Inserts or replaces the row keyed by (team, role, permission).
    async fn upsert(
        &self,
        team_id: &TeamId,
        grant: CreateGrant,
    ) -> Result<PermissionGrant, RbacError>;

    /// Inserts the rows that do not exist yet and leaves existing ones alone.
    ///
    /// Returns the number of rows written.
    async fn insert_missing(
        &self,
        team_id: &TeamId,
        grants: &[CreateGrant],
    ) -> Result<u64, RbacError>;

    /// Removes an override. Returns whether a row existed.
    async fn delete(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError>;
}
