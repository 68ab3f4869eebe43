#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::poisoned;
use crate::RbacError;
use crate::catalog::TeamPermission;
use crate::roles::TeamRole;
use crate::teams::{
    CreateGrant, PermissionGrant, TeamId, TeamPermissionRepository, sort_grants,
};

/// team -> (role, permission) -> grant
type Grants = HashMap<TeamId, HashMap<(TeamRole, TeamPermission), PermissionGrant>>;

/// Permission overrides held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryTeamPermissionRepository {
    grants: Arc<RwLock<Grants>>,
}

impl InMemoryTeamPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Grants>, RbacError> {
        self.grants.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Grants>, RbacError> {
        self.grants.write().map_err(poisoned)
    }
}

fn sorted(mut grants: Vec<PermissionGrant>) -> Vec<PermissionGrant> {
    sort_grants(&mut grants);
    grants
}

fn new_grant(team_id: &TeamId, grant: CreateGrant) -> PermissionGrant {
    PermissionGrant {
        team_id: team_id.clone(),
        role: grant.role,
        permission: grant.permission,
        granted: grant.granted,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl TeamPermissionRepository for InMemoryTeamPermissionRepository {
    async fn find_grant(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<Option<PermissionGrant>, RbacError> {
        let grants = self.read()?;
        Ok(grants
            .get(team_id)
            .and_then(|team| team.get(&(role, permission)))
            .cloned())
    }

    async fn find_by_team_and_role(
        &self,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<Vec<PermissionGrant>, RbacError> {
        let grants = self.read()?;
        let rows = grants
            .get(team_id)
            .map(|team| team.values().filter(|g| g.role == role).cloned().collect())
            .unwrap_or_default();
        Ok(sorted(rows))
    }

    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<PermissionGrant>, RbacError> {
        let grants = self.read()?;
        let rows = grants
            .get(team_id)
            .map(|team| team.values().cloned().collect())
            .unwrap_or_default();
        Ok(sorted(rows))
    }

    async fn upsert(
        &self,
        team_id: &TeamId,
        grant: CreateGrant,
    ) -> Result<PermissionGrant, RbacError> {
        let mut grants = self.write()?;
        let row = new_grant(team_id, grant);

        grants
            .entry(team_id.clone())
            .or_default()
            .insert((grant.role, grant.permission), row.clone());

        Ok(row)
    }

    async fn insert_missing(
        &self,
        team_id: &TeamId,
        rows: &[CreateGrant],
    ) -> Result<u64, RbacError> {
        let mut grants = self.write()?;
        let team = grants.entry(team_id.clone()).or_default();

        let mut written = 0;
        for grant in rows {
            team.entry((grant.role, grant.permission)).or_insert_with(|| {
                written += 1;
                new_grant(team_id, *grant)
            });
        }

        Ok(written)
    }

    async fn delete(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError> {
        let mut grants = self.write()?;
        Ok(grants
            .get_mut(team_id)
            .and_then(|team| team.remove(&(role, permission)))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(role: TeamRole, permission: TeamPermission, granted: bool) -> CreateGrant {
        CreateGrant {
            role,
            permission,
            granted,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = InMemoryTeamPermissionRepository::new();
        let team = TeamId::new("t");

        repo.upsert(&team, grant(TeamRole::Admin, TeamPermission::TeamInvite, true))
            .await
            .unwrap();
        repo.upsert(&team, grant(TeamRole::Admin, TeamPermission::TeamInvite, false))
            .await
            .unwrap();

        let rows = repo.find_by_team(&team).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].granted);
    }

    #[tokio::test]
    async fn test_insert_missing_counts_only_new_rows() {
        let repo = InMemoryTeamPermissionRepository::new();
        let team = TeamId::new("t");
        let rows = [
            grant(TeamRole::Admin, TeamPermission::TeamInvite, true),
            grant(TeamRole::Member, TeamPermission::TeamInvite, false),
        ];

        repo.upsert(&team, grant(TeamRole::Admin, TeamPermission::TeamInvite, false))
            .await
            .unwrap();

        assert_eq!(repo.insert_missing(&team, &rows).await.unwrap(), 1);
        assert_eq!(repo.insert_missing(&team, &rows).await.unwrap(), 0);

        let existing = repo
            .find_grant(&team, TeamRole::Admin, TeamPermission::TeamInvite)
            .await
            .unwrap();
        assert_eq!(existing.map(|g| g.granted), Some(false));
    }
}
