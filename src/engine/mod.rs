//! Permission resolution and role-management decisions.
//!
//! Every check reads the actor's membership, decides, and returns either the
//! resolved context ([`TeamAccess`], [`RoleManagement`]) or a classified
//! [`RbacError`]. A denial never writes to a store.

mod operations;

use std::sync::Arc;

use serde::Serialize;

use crate::RbacError;
use crate::catalog::{PermissionCatalog, TeamPermission};
use crate::config::RbacConfig;
use crate::roles::TeamRole;
use crate::teams::{
    TeamId, TeamMembershipRepository, TeamMembershipStore, TeamPermissionRepository,
    TeamPermissionStore, UserId, can_manage_role,
};

/// Context returned by an allowed check.
///
/// `granted` holds the checked permissions the actor holds, in the order
/// they were asked for. Role-floor checks leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamAccess {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: TeamRole,
    pub granted: Vec<TeamPermission>,
}

impl TeamAccess {
    pub fn has(&self, permission: TeamPermission) -> bool {
        self.granted.contains(&permission)
    }
}

/// Roles resolved by an allowed role-management check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleManagement {
    pub actor_role: TeamRole,
    pub target_role: TeamRole,
}

/// Answers "may this user do this in this team" over a membership store and
/// a permission store.
pub struct AuthorizationEngine<M, P>
where
    M: TeamMembershipRepository,
    P: TeamPermissionRepository,
{
    memberships: TeamMembershipStore<M>,
    permissions: TeamPermissionStore<P>,
    config: RbacConfig,
}

impl<M, P> AuthorizationEngine<M, P>
where
    M: TeamMembershipRepository,
    P: TeamPermissionRepository,
{
    /// Creates an engine with the default configuration.
    pub fn new(membership_repo: M, permission_repo: P, catalog: Arc<PermissionCatalog>) -> Self {
        Self {
            memberships: TeamMembershipStore::new(membership_repo),
            permissions: TeamPermissionStore::new(permission_repo, catalog),
            config: RbacConfig::default(),
        }
    }

    /// Creates an engine with a custom configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration does not validate.
    pub fn with_config(
        membership_repo: M,
        permission_repo: P,
        catalog: Arc<PermissionCatalog>,
        config: RbacConfig,
    ) -> Result<Self, RbacError> {
        config.validate()?;
        Ok(Self {
            memberships: TeamMembershipStore::with_config(
                membership_repo,
                config.ownership.clone(),
            )?,
            permissions: TeamPermissionStore::new(permission_repo, catalog),
            config,
        })
    }

    pub fn memberships(&self) -> &TeamMembershipStore<M> {
        &self.memberships
    }

    pub fn permissions(&self) -> &TeamPermissionStore<P> {
        &self.permissions
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        self.permissions.catalog()
    }

    pub fn config(&self) -> &RbacConfig {
        &self.config
    }

    async fn actor_role(&self, actor: &UserId, team_id: &TeamId) -> Result<TeamRole, RbacError> {
        match self.memberships.get_user_role(team_id, actor).await? {
            Some(role) => Ok(role),
            None => Err(denied(RbacError::NotATeamMember, team_id, actor)),
        }
    }

    /// Allows iff `actor` is a member of `team_id` whose role holds
    /// `permission` there.
    ///
    /// # Errors
    ///
    /// - `UnknownPermission` - not in the catalog (checked first)
    /// - `NotATeamMember` - actor has no membership
    /// - `InsufficientPermission` - the role does not hold the permission
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn require_permission(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        permission: TeamPermission,
    ) -> Result<TeamAccess, RbacError> {
        self.catalog().ensure(permission)?;

        let role = self.actor_role(actor, team_id).await?;

        if !self
            .permissions
            .has_permission(team_id, role, permission)
            .await?
        {
            log::debug!(
                target: "teamgate",
                "msg=\"permission missing\", team_id={team_id}, user_id={actor}, role={role}, permission={permission}"
            );
            return Err(RbacError::InsufficientPermission);
        }

        Ok(TeamAccess {
            team_id: team_id.clone(),
            user_id: actor.clone(),
            role,
            granted: vec![permission],
        })
    }

    /// [`require_permission`](Self::require_permission) for a string
    /// identifier taken from configuration or a route table.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn require_permission_id(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        permission: &str,
    ) -> Result<TeamAccess, RbacError> {
        let permission = self.catalog().parse(permission)?;
        self.require_permission(actor, team_id, permission).await
    }

    /// Allows iff the actor holds at least one of `permissions`.
    ///
    /// Every permission is validated before any is evaluated. The returned
    /// access lists the held subset in input order.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn require_any_permission(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        permissions: &[TeamPermission],
    ) -> Result<TeamAccess, RbacError> {
        for permission in permissions {
            self.catalog().ensure(*permission)?;
        }

        let role = self.actor_role(actor, team_id).await?;

        let mut granted = Vec::with_capacity(permissions.len());
        for permission in permissions {
            if granted.contains(permission) {
                continue;
            }
            if self
                .permissions
                .has_permission(team_id, role, *permission)
                .await?
            {
                granted.push(*permission);
            }
        }

        if granted.is_empty() {
            log::debug!(
                target: "teamgate",
                "msg=\"no listed permission held\", team_id={team_id}, user_id={actor}, role={role}, checked={}",
                permissions.len()
            );
            return Err(RbacError::InsufficientPermission);
        }

        Ok(TeamAccess {
            team_id: team_id.clone(),
            user_id: actor.clone(),
            role,
            granted,
        })
    }

    /// Allows iff the actor's role carries at least the authority of
    /// `minimum`. A moderator passes a moderator floor; a member does not.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn require_role(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        minimum: TeamRole,
    ) -> Result<TeamAccess, RbacError> {
        let role = self.actor_role(actor, team_id).await?;

        if !role.is_at_least(minimum) {
            log::debug!(
                target: "teamgate",
                "msg=\"role below floor\", team_id={team_id}, user_id={actor}, role={role}, minimum={minimum}"
            );
            return Err(RbacError::InsufficientRole);
        }

        Ok(TeamAccess {
            team_id: team_id.clone(),
            user_id: actor.clone(),
            role,
            granted: Vec::new(),
        })
    }

    /// Allows iff `actor` may change `target`'s role.
    ///
    /// # Errors
    ///
    /// In order of evaluation:
    /// - `NotATeamMember` - actor has no membership
    /// - `TargetNotMember` - target has no membership
    /// - `SelfManagement` - actor and target are the same user
    /// - `InsufficientAuthority` - actor does not strictly outrank target
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn require_role_management(
        &self,
        actor: &UserId,
        team_id: &TeamId,
        target: &UserId,
    ) -> Result<RoleManagement, RbacError> {
        let actor_role = self.actor_role(actor, team_id).await?;

        let Some(target_role) = self.memberships.get_user_role(team_id, target).await? else {
            return Err(denied(RbacError::TargetNotMember, team_id, actor));
        };

        if actor == target {
            return Err(denied(RbacError::SelfManagement, team_id, actor));
        }

        if !can_manage_role(actor_role, target_role) {
            log::debug!(
                target: "teamgate",
                "msg=\"role management denied\", team_id={team_id}, user_id={actor}, target={target}, actor_role={actor_role}, target_role={target_role}"
            );
            return Err(RbacError::InsufficientAuthority);
        }

        Ok(RoleManagement {
            actor_role,
            target_role,
        })
    }
}

fn denied(reason: RbacError, team_id: &TeamId, actor: &UserId) -> RbacError {
    log::debug!(
        target: "teamgate",
        "msg=\"access denied\", team_id={team_id}, user_id={actor}, reason={}",
        reason.code()
    );
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTeamMembershipRepository, InMemoryTeamPermissionRepository};

    type Engine =
        AuthorizationEngine<InMemoryTeamMembershipRepository, InMemoryTeamPermissionRepository>;

    fn engine() -> Engine {
        AuthorizationEngine::new(
            InMemoryTeamMembershipRepository::new(),
            InMemoryTeamPermissionRepository::new(),
            Arc::new(PermissionCatalog::standard()),
        )
    }

    async fn seeded() -> (Engine, TeamId) {
        let engine = engine();
        let team = TeamId::new("T1");
        let store = engine.memberships();
        store
            .add_member(&team, &UserId::new("alice"), TeamRole::Owner)
            .await
            .unwrap();
        store
            .add_member(&team, &UserId::new("bob"), TeamRole::Admin)
            .await
            .unwrap();
        store
            .add_member(&team, &UserId::new("mia"), TeamRole::Moderator)
            .await
            .unwrap();
        store
            .add_member(&team, &UserId::new("carol"), TeamRole::Member)
            .await
            .unwrap();
        (engine, team)
    }

    #[tokio::test]
    async fn test_require_permission() {
        let (engine, team) = seeded().await;

        let access = engine
            .require_permission(&UserId::new("bob"), &team, TeamPermission::TeamInvite)
            .await
            .unwrap();
        assert_eq!(access.role, TeamRole::Admin);
        assert!(access.has(TeamPermission::TeamInvite));

        assert_eq!(
            engine
                .require_permission(&UserId::new("carol"), &team, TeamPermission::TeamInvite)
                .await,
            Err(RbacError::InsufficientPermission)
        );
        assert_eq!(
            engine
                .require_permission(&UserId::new("zed"), &team, TeamPermission::TeamView)
                .await,
            Err(RbacError::NotATeamMember)
        );
    }

    #[tokio::test]
    async fn test_require_permission_follows_override() {
        let (engine, team) = seeded().await;
        let bob = UserId::new("bob");

        engine
            .permissions()
            .set_permission(&team, TeamRole::Admin, TeamPermission::TeamInvite, false)
            .await
            .unwrap();

        assert_eq!(
            engine
                .require_permission(&bob, &team, TeamPermission::TeamInvite)
                .await,
            Err(RbacError::InsufficientPermission)
        );
    }

    #[tokio::test]
    async fn test_require_permission_id() {
        let (engine, team) = seeded().await;
        let carol = UserId::new("carol");

        let access = engine
            .require_permission_id(&carol, &team, "team.chat.send")
            .await
            .unwrap();
        assert_eq!(access.granted, vec![TeamPermission::ChatSend]);

        assert_eq!(
            engine
                .require_permission_id(&carol, &team, "team.teleport")
                .await,
            Err(RbacError::UnknownPermission("team.teleport".into()))
        );
    }

    #[tokio::test]
    async fn test_unknown_permission_is_fatal_even_for_outsiders() {
        let catalog = PermissionCatalog::builder()
            .permission(TeamPermission::TeamView, "View", &TeamRole::ALL)
            .build()
            .unwrap();
        let engine = AuthorizationEngine::new(
            InMemoryTeamMembershipRepository::new(),
            InMemoryTeamPermissionRepository::new(),
            Arc::new(catalog),
        );

        let err = engine
            .require_permission(&UserId::new("zed"), &TeamId::new("T1"), TeamPermission::ChatSend)
            .await
            .unwrap_err();
        assert_eq!(err, RbacError::UnknownPermission("team.chat.send".into()));
        assert!(!err.is_denial());
    }

    #[tokio::test]
    async fn test_require_any_permission_collects_subset_in_order() {
        let (engine, team) = seeded().await;

        let access = engine
            .require_any_permission(
                &UserId::new("mia"),
                &team,
                &[
                    TeamPermission::ChatModerate,
                    TeamPermission::TeamInvite,
                    TeamPermission::TeamView,
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            access.granted,
            vec![TeamPermission::ChatModerate, TeamPermission::TeamView]
        );

        assert_eq!(
            engine
                .require_any_permission(
                    &UserId::new("carol"),
                    &team,
                    &[TeamPermission::TeamInvite, TeamPermission::TeamManage],
                )
                .await,
            Err(RbacError::InsufficientPermission)
        );
        assert_eq!(
            engine
                .require_any_permission(&UserId::new("carol"), &team, &[])
                .await,
            Err(RbacError::InsufficientPermission)
        );
    }

    #[tokio::test]
    async fn test_require_role_boundary() {
        let (engine, team) = seeded().await;

        assert!(
            engine
                .require_role(&UserId::new("mia"), &team, TeamRole::Moderator)
                .await
                .is_ok()
        );
        assert!(
            engine
                .require_role(&UserId::new("alice"), &team, TeamRole::Moderator)
                .await
                .is_ok()
        );
        assert_eq!(
            engine
                .require_role(&UserId::new("carol"), &team, TeamRole::Moderator)
                .await,
            Err(RbacError::InsufficientRole)
        );
        assert_eq!(
            engine
                .require_role(&UserId::new("zed"), &team, TeamRole::Member)
                .await,
            Err(RbacError::NotATeamMember)
        );
    }

    #[tokio::test]
    async fn test_require_role_management() {
        let (engine, team) = seeded().await;
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let carol = UserId::new("carol");

        assert_eq!(
            engine.require_role_management(&bob, &team, &carol).await,
            Ok(RoleManagement {
                actor_role: TeamRole::Admin,
                target_role: TeamRole::Member,
            })
        );
        assert_eq!(
            engine.require_role_management(&carol, &team, &bob).await,
            Err(RbacError::InsufficientAuthority)
        );
        assert_eq!(
            engine.require_role_management(&bob, &team, &alice).await,
            Err(RbacError::InsufficientAuthority)
        );
        assert_eq!(
            engine.require_role_management(&alice, &team, &alice).await,
            Err(RbacError::SelfManagement)
        );
    }

    #[tokio::test]
    async fn test_require_role_management_membership_order() {
        let (engine, team) = seeded().await;
        let zed = UserId::new("zed");
        let bob = UserId::new("bob");

        assert_eq!(
            engine.require_role_management(&zed, &team, &zed).await,
            Err(RbacError::NotATeamMember)
        );
        assert_eq!(
            engine.require_role_management(&bob, &team, &zed).await,
            Err(RbacError::TargetNotMember)
        );
    }

    #[test]
    fn test_with_config_rejects_owner_successor() {
        let mut config = RbacConfig::default();
        config.ownership.successor_role = TeamRole::Owner;

        let result = AuthorizationEngine::with_config(
            InMemoryTeamMembershipRepository::new(),
            InMemoryTeamPermissionRepository::new(),
            Arc::new(PermissionCatalog::standard()),
            config,
        );
        assert!(matches!(result, Err(RbacError::InvalidConfig(_))));
    }

    #[test]
    fn test_team_access_serializes() {
        let access = TeamAccess {
            team_id: TeamId::new("T1"),
            user_id: UserId::new("bob"),
            role: TeamRole::Admin,
            granted: vec![TeamPermission::TeamInvite],
        };

        let json = serde_json::to_value(&access).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["granted"][0], "team.invite");
        assert_eq!(json["team_id"], "T1");
    }
}
