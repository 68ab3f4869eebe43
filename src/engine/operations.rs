use chrono::Utc;

use super::AuthorizationEngine;
use crate::RbacError;
use crate::catalog::TeamPermission;
use crate::events::{TeamEvent, dispatch};
use crate::roles::TeamRole;
use crate::teams::{
    PermissionGrant, PermissionSet, TeamId, TeamMembership, TeamMembershipRepository,
    TeamPermissionRepository, UserId,
};

impl<M, P> AuthorizationEngine<M, P>
where
    M: TeamMembershipRepository,
    P: TeamPermissionRepository,
{
    /// Creates the owner membership of a new team.
    ///
    /// With `initialize_on_found` set, the catalog defaults are written as
    /// explicit rows right after. A failure there is logged and does not
    /// undo the founding: absent rows already resolve to the defaults, and
    /// `initialize_team_defaults` can finish the job later.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn found_team(
        &self,
        team_id: &TeamId,
        owner: &UserId,
    ) -> Result<TeamMembership, RbacError> {
        let membership = self
            .memberships
            .add_member(team_id, owner, TeamRole::Owner)
            .await?;

        dispatch(TeamEvent::MemberAdded {
            team_id: team_id.clone(),
            user_id: owner.clone(),
            role: TeamRole::Owner,
            at: membership.created_at,
        })
        .await;

        if self.config.initialize_on_found {
            match self.permissions.initialize_defaults(team_id).await {
                Ok(rows_written) => {
                    dispatch(TeamEvent::DefaultsInitialized {
                        team_id: team_id.clone(),
                        rows_written,
                        at: Utc::now(),
                    })
                    .await;
                }
                Err(e) => {
                    log::warn!(
                        target: "teamgate",
                        "msg=\"team founded without default rows\", team_id={team_id}, error=\"{e}\""
                    );
                }
            }
        }

        Ok(membership)
    }

    /// Adds a member to an existing team, e.g. on invitation acceptance.
    ///
    /// Whoever issued the invitation was checked for `team.invite` at that
    /// point; this call only keeps the membership invariants.
    ///
    /// # Errors
    ///
    /// - `OwnershipTransferRequired` - `role` is owner
    /// - `TeamNotFound` - the team has no owner yet
    /// - `AlreadyMember` - the user already belongs to the team
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn add_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        if role.is_owner() {
            return Err(RbacError::OwnershipTransferRequired);
        }

        let membership = self.memberships.add_member(team_id, user_id, role).await?;

        dispatch(TeamEvent::MemberAdded {
            team_id: team_id.clone(),
            user_id: user_id.clone(),
            role,
            at: membership.created_at,
        })
        .await;

        Ok(membership)
    }

    /// Changes `target`'s role on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Everything [`require_role_management`](Self::require_role_management)
    /// returns, then:
    /// - `InsufficientPermission` - actor lacks `team.roles.manage`
    /// - `OwnershipTransferRequired` - `new_role` is owner
    /// - `InsufficientAuthority` - actor does not outrank `new_role`
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn change_member_role(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        target: &UserId,
        new_role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        let management = self.require_role_management(actor, team_id, target).await?;

        if !self
            .permissions
            .has_permission(team_id, management.actor_role, TeamPermission::RolesManage)
            .await?
        {
            return Err(RbacError::InsufficientPermission);
        }

        if new_role.is_owner() {
            return Err(RbacError::OwnershipTransferRequired);
        }

        if !management.actor_role.outranks(new_role) {
            log::debug!(
                target: "teamgate",
                "msg=\"promotion above authority\", team_id={team_id}, user_id={actor}, actor_role={}, new_role={new_role}",
                management.actor_role
            );
            return Err(RbacError::InsufficientAuthority);
        }

        let membership = self
            .memberships
            .set_user_role(team_id, target, new_role)
            .await?;

        if management.target_role != new_role {
            dispatch(TeamEvent::MemberRoleChanged {
                team_id: team_id.clone(),
                user_id: target.clone(),
                from: management.target_role,
                to: new_role,
                by: actor.clone(),
                at: membership.updated_at,
            })
            .await;
        }

        Ok(membership)
    }

    /// Removes `target` from the team. When `actor == target` this is the
    /// member leaving, which needs no permission.
    ///
    /// # Errors
    ///
    /// - `LastOwner` - the owner cannot leave or be removed
    /// - `NotATeamMember` - a leaving actor has no membership
    /// - otherwise the role-management errors, then `InsufficientPermission`
    ///   without `team.members.remove`
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn remove_member(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        target: &UserId,
    ) -> Result<(), RbacError> {
        if actor == target {
            let role = self.actor_role(actor, team_id).await?;
            if role.is_owner() {
                return Err(RbacError::LastOwner);
            }
        } else {
            let management = self.require_role_management(actor, team_id, target).await?;

            if !self
                .permissions
                .has_permission(team_id, management.actor_role, TeamPermission::MembersRemove)
                .await?
            {
                return Err(RbacError::InsufficientPermission);
            }
        }

        self.memberships.remove_membership(team_id, target).await?;

        dispatch(TeamEvent::MemberRemoved {
            team_id: team_id.clone(),
            user_id: target.clone(),
            by: actor.clone(),
            at: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Hands the team from `actor` to `to`.
    ///
    /// Whether `actor` is the owner is decided inside the store's atomic
    /// swap, so of two concurrent transfers by the same owner exactly one
    /// succeeds and the other gets `NotOwner`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn transfer_ownership(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        to: &UserId,
    ) -> Result<(), RbacError> {
        self.actor_role(actor, team_id).await?;

        self.memberships
            .transfer_ownership(team_id, actor, to)
            .await?;

        if actor != to {
            dispatch(TeamEvent::OwnershipTransferred {
                team_id: team_id.clone(),
                from: actor.clone(),
                to: to.clone(),
                at: Utc::now(),
            })
            .await;
        }

        Ok(())
    }

    /// Writes a per-team override for `role`.
    ///
    /// The actor needs `team.manage` and must outrank `role`, so nobody edits
    /// the grants of their own rank or above.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn set_role_permission(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
        granted: bool,
    ) -> Result<PermissionGrant, RbacError> {
        self.catalog().ensure(permission)?;
        self.require_grant_authority(actor, team_id, role).await?;

        let grant = self
            .permissions
            .set_permission(team_id, role, permission, granted)
            .await?;

        dispatch(TeamEvent::PermissionSet {
            team_id: team_id.clone(),
            role,
            permission,
            granted,
            by: actor.clone(),
            at: grant.updated_at,
        })
        .await;

        Ok(grant)
    }

    /// Drops a per-team override for `role`. Same policy as
    /// [`set_role_permission`](Self::set_role_permission).
    ///
    /// Returns whether an override existed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn reset_role_permission(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError> {
        self.catalog().ensure(permission)?;
        self.require_grant_authority(actor, team_id, role).await?;

        let existed = self
            .permissions
            .reset_permission(team_id, role, permission)
            .await?;

        if existed {
            dispatch(TeamEvent::PermissionReset {
                team_id: team_id.clone(),
                role,
                permission,
                by: actor.clone(),
                at: Utc::now(),
            })
            .await;
        }

        Ok(existed)
    }

    /// Writes the catalog defaults for every missing cell. Requires
    /// `team.manage`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn initialize_team_defaults(
        &self,
        actor: &UserId,
        team_id: &TeamId,
    ) -> Result<u64, RbacError> {
        self.require_permission(actor, team_id, TeamPermission::TeamManage)
            .await?;

        let rows_written = self.permissions.initialize_defaults(team_id).await?;

        dispatch(TeamEvent::DefaultsInitialized {
            team_id: team_id.clone(),
            rows_written,
            at: Utc::now(),
        })
        .await;

        Ok(rows_written)
    }

    /// The actor's own resolved permission table.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn permissions_for_member(
        &self,
        actor: &UserId,
        team_id: &TeamId,
    ) -> Result<PermissionSet, RbacError> {
        let role = self.actor_role(actor, team_id).await?;
        self.permissions.get_permissions_for_role(team_id, role).await
    }

    async fn require_grant_authority(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<(), RbacError> {
        let access = self
            .require_permission(actor, team_id, TeamPermission::TeamManage)
            .await?;

        if !access.role.outranks(role) {
            log::debug!(
                target: "teamgate",
                "msg=\"grant edit above authority\", team_id={team_id}, user_id={actor}, actor_role={}, role={role}",
                access.role
            );
            return Err(RbacError::InsufficientAuthority);
        }

        Ok(())
    }
}
