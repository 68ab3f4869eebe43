#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::poisoned;
use crate::RbacError;
use crate::roles::TeamRole;
use crate::teams::{
    CreateMembership, TeamId, TeamMembership, TeamMembershipRepository, UserId, sort_memberships,
};

type Teams = HashMap<TeamId, HashMap<UserId, TeamMembership>>;

/// Memberships held in process memory.
///
/// Every write takes the one write lock, which is what serializes ownership
/// transfers and owner removal.
#[derive(Clone, Default)]
pub struct InMemoryTeamMembershipRepository {
    teams: Arc<RwLock<Teams>>,
}

impl InMemoryTeamMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Teams>, RbacError> {
        self.teams.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Teams>, RbacError> {
        self.teams.write().map_err(poisoned)
    }
}

fn sorted(mut memberships: Vec<TeamMembership>) -> Vec<TeamMembership> {
    sort_memberships(&mut memberships);
    memberships
}

#[async_trait]
impl TeamMembershipRepository for InMemoryTeamMembershipRepository {
    async fn find_by_team_and_user(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMembership>, RbacError> {
        let teams = self.read()?;
        Ok(teams
            .get(team_id)
            .and_then(|members| members.get(user_id))
            .cloned())
    }

    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<TeamMembership>, RbacError> {
        let teams = self.read()?;
        let members = teams
            .get(team_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default();
        Ok(sorted(members))
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<TeamMembership>, RbacError> {
        let teams = self.read()?;
        let memberships = teams
            .values()
            .filter_map(|members| members.get(user_id))
            .cloned()
            .collect();
        Ok(sorted(memberships))
    }

    async fn find_owner(&self, team_id: &TeamId) -> Result<Option<TeamMembership>, RbacError> {
        let teams = self.read()?;
        Ok(teams
            .get(team_id)
            .and_then(|members| members.values().find(|m| m.role.is_owner()))
            .cloned())
    }

    async fn create(&self, data: CreateMembership) -> Result<TeamMembership, RbacError> {
        let mut teams = self.write()?;

        let existing = teams.get(&data.team_id);
        if existing.is_some_and(|members| members.contains_key(&data.user_id)) {
            return Err(RbacError::AlreadyMember);
        }

        let has_owner =
            existing.is_some_and(|members| members.values().any(|m| m.role.is_owner()));
        match (data.role.is_owner(), has_owner) {
            (true, true) => return Err(RbacError::OwnershipTransferRequired),
            (false, false) => return Err(RbacError::TeamNotFound),
            _ => {}
        }

        let now = Utc::now();
        let membership = TeamMembership {
            team_id: data.team_id,
            user_id: data.user_id,
            role: data.role,
            created_at: now,
            updated_at: now,
        };

        teams
            .entry(membership.team_id.clone())
            .or_default()
            .insert(membership.user_id.clone(), membership.clone());

        Ok(membership)
    }

    async fn update_role(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        let mut teams = self.write()?;

        let membership = teams
            .get_mut(team_id)
            .and_then(|members| members.get_mut(user_id))
            .ok_or(RbacError::TargetNotMember)?;

        if membership.role.is_owner() || role.is_owner() {
            return Err(RbacError::OwnershipTransferRequired);
        }

        membership.role = role;
        membership.updated_at = Utc::now();

        Ok(membership.clone())
    }

    async fn transfer_ownership(
        &self,
        team_id: &TeamId,
        from: &UserId,
        to: &UserId,
        successor: TeamRole,
    ) -> Result<(), RbacError> {
        if successor.is_owner() {
            return Err(RbacError::InvalidConfig(
                "ownership successor role cannot be owner".into(),
            ));
        }

        let mut teams = self.write()?;
        let members = teams.get_mut(team_id).ok_or(RbacError::NotOwner)?;

        if !members.get(from).is_some_and(|m| m.role.is_owner()) {
            return Err(RbacError::NotOwner);
        }
        if !members.contains_key(to) {
            return Err(RbacError::TargetNotMember);
        }
        if from == to {
            return Ok(());
        }

        let now = Utc::now();
        if let Some(previous) = members.get_mut(from) {
            previous.role = successor;
            previous.updated_at = now;
        }
        if let Some(next) = members.get_mut(to) {
            next.role = TeamRole::Owner;
            next.updated_at = now;
        }

        Ok(())
    }

    async fn delete(&self, team_id: &TeamId, user_id: &UserId) -> Result<(), RbacError> {
        let mut teams = self.write()?;
        let members = teams.get_mut(team_id).ok_or(RbacError::TargetNotMember)?;

        match members.get(user_id) {
            None => Err(RbacError::TargetNotMember),
            Some(m) if m.role.is_owner() => Err(RbacError::LastOwner),
            Some(_) => {
                members.remove(user_id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(team: &str, user: &str, role: TeamRole) -> CreateMembership {
        CreateMembership {
            team_id: TeamId::new(team),
            user_id: UserId::new(user),
            role,
        }
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let repo = InMemoryTeamMembershipRepository::new();
        let handle = repo.clone();

        repo.create(membership("t", "alice", TeamRole::Owner))
            .await
            .unwrap();

        let found = handle
            .find_by_team_and_user(&TeamId::new("t"), &UserId::new("alice"))
            .await
            .unwrap();
        assert_eq!(found.map(|m| m.role), Some(TeamRole::Owner));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_team_behind() {
        let repo = InMemoryTeamMembershipRepository::new();

        let err = repo
            .create(membership("ghost", "bob", TeamRole::Member))
            .await
            .unwrap_err();
        assert_eq!(err, RbacError::TeamNotFound);
        assert!(repo.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_self_is_noop() {
        let repo = InMemoryTeamMembershipRepository::new();
        let team = TeamId::new("t");
        let alice = UserId::new("alice");
        repo.create(membership("t", "alice", TeamRole::Owner))
            .await
            .unwrap();

        repo.transfer_ownership(&team, &alice, &alice, TeamRole::Admin)
            .await
            .unwrap();

        let owner = repo.find_owner(&team).await.unwrap();
        assert_eq!(owner.map(|m| m.user_id), Some(alice));
    }

    #[tokio::test]
    async fn test_transfer_on_unknown_team_is_not_owner() {
        let repo = InMemoryTeamMembershipRepository::new();

        let err = repo
            .transfer_ownership(
                &TeamId::new("none"),
                &UserId::new("a"),
                &UserId::new("b"),
                TeamRole::Admin,
            )
            .await
            .unwrap_err();
        assert_eq!(err, RbacError::NotOwner);
    }
}
