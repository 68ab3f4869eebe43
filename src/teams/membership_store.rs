use super::repository::{CreateMembership, TeamMembershipRepository};
use super::types::{TeamId, TeamMembership, UserId};
use crate::RbacError;
use crate::config::OwnershipConfig;
use crate::roles::TeamRole;

/// Per-team mapping of user to role.
///
/// Hierarchy policy (who may change whom) lives in the engine. This type
/// only keeps the single-owner invariant intact.
pub struct TeamMembershipStore<M>
where
    M: TeamMembershipRepository,
{
    repo: M,
    config: OwnershipConfig,
}

impl<M: TeamMembershipRepository> TeamMembershipStore<M> {
    /// Creates a store with the default ownership configuration.
    pub fn new(repo: M) -> Self {
        Self {
            repo,
            config: OwnershipConfig::default(),
        }
    }

    /// Creates a store with a custom ownership configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the successor role is `owner`.
    pub fn with_config(repo: M, config: OwnershipConfig) -> Result<Self, RbacError> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn repository(&self) -> &M {
        &self.repo
    }

    /// The user's role in the team, or `None` if they are not a member.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn get_user_role(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamRole>, RbacError> {
        Ok(self
            .repo
            .find_by_team_and_user(team_id, user_id)
            .await?
            .map(|m| m.role))
    }

    /// Changes a member's role without any hierarchy check.
    ///
    /// # Errors
    ///
    /// - `TargetNotMember` - no membership for `user_id`
    /// - `OwnershipTransferRequired` - `role` is owner, or the user is the owner
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn set_user_role(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        if role.is_owner() {
            return Err(RbacError::OwnershipTransferRequired);
        }

        let membership = self.repo.update_role(team_id, user_id, role).await?;

        log::info!(
            target: "teamgate",
            "msg=\"member role updated\", team_id={team_id}, user_id={user_id}, role={role}"
        );

        Ok(membership)
    }

    /// Hands the team from `from` to `to` in one atomic step.
    ///
    /// The previous owner becomes the configured successor role.
    ///
    /// # Errors
    ///
    /// - `NotOwner` - `from` is not the owner when the write happens
    /// - `TargetNotMember` - `to` has no membership
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn transfer_ownership(
        &self,
        team_id: &TeamId,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), RbacError> {
        let successor = self.config.successor_role;

        self.repo
            .transfer_ownership(team_id, from, to, successor)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"ownership transferred\", team_id={team_id}, from={from}, to={to}, successor_role={successor}"
        );

        Ok(())
    }

    /// Removes a membership.
    ///
    /// # Errors
    ///
    /// - `LastOwner` - the user owns the team
    /// - `TargetNotMember` - no membership for `user_id`
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn remove_membership(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<(), RbacError> {
        self.repo.delete(team_id, user_id).await?;

        log::info!(
            target: "teamgate",
            "msg=\"membership removed\", team_id={team_id}, user_id={user_id}"
        );

        Ok(())
    }

    /// Adds a member on join or invitation acceptance.
    ///
    /// The first membership of a team must be its owner.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn add_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        let membership = self
            .repo
            .create(CreateMembership {
                team_id: team_id.clone(),
                user_id: user_id.clone(),
                role,
            })
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"member added\", team_id={team_id}, user_id={user_id}, role={role}"
        );

        Ok(membership)
    }

    pub async fn list_members(&self, team_id: &TeamId) -> Result<Vec<TeamMembership>, RbacError> {
        self.repo.find_by_team(team_id).await
    }

    pub async fn list_teams_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TeamMembership>, RbacError> {
        self.repo.find_by_user(user_id).await
    }

    pub async fn owner_of(&self, team_id: &TeamId) -> Result<Option<UserId>, RbacError> {
        Ok(self.repo.find_owner(team_id).await?.map(|m| m.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTeamMembershipRepository;

    async fn seeded() -> (TeamMembershipStore<InMemoryTeamMembershipRepository>, TeamId) {
        let store = TeamMembershipStore::new(InMemoryTeamMembershipRepository::new());
        let team = TeamId::new("T1");
        store
            .add_member(&team, &UserId::new("alice"), TeamRole::Owner)
            .await
            .unwrap();
        store
            .add_member(&team, &UserId::new("bob"), TeamRole::Admin)
            .await
            .unwrap();
        store
            .add_member(&team, &UserId::new("carol"), TeamRole::Member)
            .await
            .unwrap();
        (store, team)
    }

    #[tokio::test]
    async fn test_get_user_role_absent_is_none() {
        let (store, team) = seeded().await;

        assert_eq!(
            store.get_user_role(&team, &UserId::new("bob")).await.unwrap(),
            Some(TeamRole::Admin)
        );
        assert_eq!(
            store.get_user_role(&team, &UserId::new("mallory")).await.unwrap(),
            None
        );
        assert_eq!(
            store
                .get_user_role(&TeamId::new("T2"), &UserId::new("bob"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_set_user_role() {
        let (store, team) = seeded().await;
        let carol = UserId::new("carol");

        let updated = store
            .set_user_role(&team, &carol, TeamRole::Moderator)
            .await
            .unwrap();
        assert_eq!(updated.role, TeamRole::Moderator);
        assert_eq!(
            store.get_user_role(&team, &carol).await.unwrap(),
            Some(TeamRole::Moderator)
        );
    }

    #[tokio::test]
    async fn test_set_user_role_never_touches_ownership() {
        let (store, team) = seeded().await;

        assert_eq!(
            store
                .set_user_role(&team, &UserId::new("bob"), TeamRole::Owner)
                .await,
            Err(RbacError::OwnershipTransferRequired)
        );
        assert_eq!(
            store
                .set_user_role(&team, &UserId::new("alice"), TeamRole::Admin)
                .await,
            Err(RbacError::OwnershipTransferRequired)
        );
        assert_eq!(
            store
                .set_user_role(&team, &UserId::new("nobody"), TeamRole::Admin)
                .await,
            Err(RbacError::TargetNotMember)
        );
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let (store, team) = seeded().await;
        let alice = UserId::new("alice");
        let carol = UserId::new("carol");

        store.transfer_ownership(&team, &alice, &carol).await.unwrap();

        assert_eq!(store.owner_of(&team).await.unwrap(), Some(carol.clone()));
        assert_eq!(
            store.get_user_role(&team, &alice).await.unwrap(),
            Some(TeamRole::Admin)
        );
        assert_eq!(
            store.get_user_role(&team, &carol).await.unwrap(),
            Some(TeamRole::Owner)
        );
    }

    #[tokio::test]
    async fn test_transfer_ownership_errors() {
        let (store, team) = seeded().await;

        assert_eq!(
            store
                .transfer_ownership(&team, &UserId::new("bob"), &UserId::new("carol"))
                .await,
            Err(RbacError::NotOwner)
        );
        assert_eq!(
            store
                .transfer_ownership(&team, &UserId::new("alice"), &UserId::new("dave"))
                .await,
            Err(RbacError::TargetNotMember)
        );
        // failed attempts leave the owner in place
        assert_eq!(
            store.owner_of(&team).await.unwrap(),
            Some(UserId::new("alice"))
        );
    }

    #[tokio::test]
    async fn test_transfer_uses_configured_successor() {
        let store = TeamMembershipStore::with_config(
            InMemoryTeamMembershipRepository::new(),
            OwnershipConfig {
                successor_role: TeamRole::Member,
            },
        )
        .unwrap();
        let team = TeamId::new("T1");
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        store.add_member(&team, &alice, TeamRole::Owner).await.unwrap();
        store.add_member(&team, &bob, TeamRole::Moderator).await.unwrap();

        store.transfer_ownership(&team, &alice, &bob).await.unwrap();

        assert_eq!(
            store.get_user_role(&team, &alice).await.unwrap(),
            Some(TeamRole::Member)
        );
    }

    #[tokio::test]
    async fn test_remove_membership() {
        let (store, team) = seeded().await;

        assert_eq!(
            store.remove_membership(&team, &UserId::new("alice")).await,
            Err(RbacError::LastOwner)
        );

        store
            .remove_membership(&team, &UserId::new("carol"))
            .await
            .unwrap();
        assert_eq!(store.list_members(&team).await.unwrap().len(), 2);

        assert_eq!(
            store.remove_membership(&team, &UserId::new("carol")).await,
            Err(RbacError::TargetNotMember)
        );
    }

    #[tokio::test]
    async fn test_add_member_rules() {
        let (store, team) = seeded().await;

        assert_eq!(
            store
                .add_member(&team, &UserId::new("bob"), TeamRole::Member)
                .await,
            Err(RbacError::AlreadyMember)
        );
        assert_eq!(
            store
                .add_member(&team, &UserId::new("erin"), TeamRole::Owner)
                .await,
            Err(RbacError::OwnershipTransferRequired)
        );
        assert_eq!(
            store
                .add_member(&TeamId::new("empty"), &UserId::new("erin"), TeamRole::Member)
                .await,
            Err(RbacError::TeamNotFound)
        );
    }

    #[test]
    fn test_owner_successor_config_rejected() {
        let result = TeamMembershipStore::with_config(
            InMemoryTeamMembershipRepository::new(),
            OwnershipConfig {
                successor_role: TeamRole::Owner,
            },
        );
        assert!(matches!(result, Err(RbacError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_list_teams_for_user() {
        let (store, team) = seeded().await;
        let other = TeamId::new("T2");
        store
            .add_member(&other, &UserId::new("bob"), TeamRole::Owner)
            .await
            .unwrap();

        let teams = store.list_teams_for_user(&UserId::new("bob")).await.unwrap();
        let mut ids: Vec<&str> = teams.iter().map(|m| m.team_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![team.as_str(), other.as_str()]);
    }
}
