//! `PostgreSQL` implementation of [`TeamMembershipRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{is_unique_violation, store_error};
use crate::RbacError;
use crate::roles::TeamRole;
use crate::teams::{CreateMembership, TeamId, TeamMembership, TeamMembershipRepository, UserId};

/// `PostgreSQL`-backed membership repository.
///
/// A transfer demotes the current owner with `WHERE role = 'owner'` before
/// promoting the target. Under row locking a second transfer racing the
/// first matches no row once the first commits and fails with `NotOwner`.
#[derive(Clone)]
pub struct PostgresTeamMembershipRepository {
    pool: PgPool,
}

impl PostgresTeamMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct MembershipRecord {
    team_id: String,
    user_id: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRecord> for TeamMembership {
    type Error = RbacError;

    fn try_from(row: MembershipRecord) -> Result<Self, Self::Error> {
        Ok(TeamMembership {
            team_id: TeamId::new(row.team_id),
            user_id: UserId::new(row.user_id),
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl TeamMembershipRepository for PostgresTeamMembershipRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_team_and_user(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMembership>, RbacError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            r"
            SELECT team_id, user_id, role, created_at, updated_at
            FROM team_memberships WHERE team_id = $1 AND user_id = $2
            ",
        )
        .bind(team_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_membership", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<TeamMembership>, RbacError> {
        let rows: Vec<MembershipRecord> = sqlx::query_as(
            r"
            SELECT team_id, user_id, role, created_at, updated_at
            FROM team_memberships WHERE team_id = $1
            ORDER BY created_at ASC, user_id ASC
            ",
        )
        .bind(team_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_memberships_by_team", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<TeamMembership>, RbacError> {
        let rows: Vec<MembershipRecord> = sqlx::query_as(
            r"
            SELECT team_id, user_id, role, created_at, updated_at
            FROM team_memberships WHERE user_id = $1
            ORDER BY created_at ASC, team_id ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_memberships_by_user", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_owner(&self, team_id: &TeamId) -> Result<Option<TeamMembership>, RbacError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            r"
            SELECT team_id, user_id, role, created_at, updated_at
            FROM team_memberships WHERE team_id = $1 AND role = 'owner'
            ",
        )
        .bind(team_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_owner", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create(&self, data: CreateMembership) -> Result<TeamMembership, RbacError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("create_membership", e))?;

        let (is_member, has_owner): (bool, bool) = sqlx::query_as(
            r"
            SELECT
                EXISTS(SELECT 1 FROM team_memberships WHERE team_id = $1 AND user_id = $2),
                EXISTS(SELECT 1 FROM team_memberships WHERE team_id = $1 AND role = 'owner')
            ",
        )
        .bind(data.team_id.as_str())
        .bind(data.user_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| store_error("create_membership", e))?;

        if is_member {
            return Err(RbacError::AlreadyMember);
        }
        match (data.role.is_owner(), has_owner) {
            (true, true) => return Err(RbacError::OwnershipTransferRequired),
            (false, false) => return Err(RbacError::TeamNotFound),
            _ => {}
        }

        let row: MembershipRecord = sqlx::query_as(
            r"
            INSERT INTO team_memberships (team_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING team_id, user_id, role, created_at, updated_at
            ",
        )
        .bind(data.team_id.as_str())
        .bind(data.user_id.as_str())
        .bind(data.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if !is_unique_violation(&e) {
                store_error("create_membership", e)
            } else if data.role.is_owner() {
                RbacError::OwnershipTransferRequired
            } else {
                RbacError::AlreadyMember
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| store_error("create_membership", e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_role(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        role: TeamRole,
    ) -> Result<TeamMembership, RbacError> {
        if role.is_owner() {
            return Err(RbacError::OwnershipTransferRequired);
        }

        let row: Option<MembershipRecord> = sqlx::query_as(
            r"
            UPDATE team_memberships SET role = $1, updated_at = NOW()
            WHERE team_id = $2 AND user_id = $3 AND role <> 'owner'
            RETURNING team_id, user_id, role, created_at, updated_at
            ",
        )
        .bind(role.as_str())
        .bind(team_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("update_membership_role", e))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.find_by_team_and_user(team_id, user_id).await? {
                Some(_) => Err(RbacError::OwnershipTransferRequired),
                None => Err(RbacError::TargetNotMember),
            },
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
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

        if from == to {
            return match self.find_owner(team_id).await? {
                Some(owner) if &owner.user_id == from => Ok(()),
                _ => Err(RbacError::NotOwner),
            };
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("transfer_ownership", e))?;

        let demoted = sqlx::query(
            r"
            UPDATE team_memberships SET role = $1, updated_at = NOW()
            WHERE team_id = $2 AND user_id = $3 AND role = 'owner'
            ",
        )
        .bind(successor.as_str())
        .bind(team_id.as_str())
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("transfer_ownership", e))?;

        if demoted.rows_affected() == 0 {
            return Err(RbacError::NotOwner);
        }

        let promoted = sqlx::query(
            r"
            UPDATE team_memberships SET role = 'owner', updated_at = NOW()
            WHERE team_id = $1 AND user_id = $2
            ",
        )
        .bind(team_id.as_str())
        .bind(to.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("transfer_ownership", e))?;

        if promoted.rows_affected() == 0 {
            return Err(RbacError::TargetNotMember);
        }

        tx.commit()
            .await
            .map_err(|e| store_error("transfer_ownership", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete(&self, team_id: &TeamId, user_id: &UserId) -> Result<(), RbacError> {
        let result = sqlx::query(
            "DELETE FROM team_memberships WHERE team_id = $1 AND user_id = $2 AND role <> 'owner'",
        )
        .bind(team_id.as_str())
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("delete_membership", e))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_by_team_and_user(team_id, user_id).await? {
            Some(_) => Err(RbacError::LastOwner),
            None => Err(RbacError::TargetNotMember),
        }
    }
}
