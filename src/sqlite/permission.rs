//! `SQLite` implementation of [`TeamPermissionRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::store_error;
use crate::RbacError;
use crate::catalog::TeamPermission;
use crate::roles::TeamRole;
use crate::teams::{CreateGrant, PermissionGrant, TeamId, TeamPermissionRepository, sort_grants};

const COLUMNS: &str = "team_id, role, permission, granted, updated_at";

/// `SQLite`-backed permission override repository.
#[derive(Clone)]
pub struct SqliteTeamPermissionRepository {
    pool: SqlitePool,
}

impl SqliteTeamPermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct GrantRecord {
    team_id: String,
    role: String,
    permission: String,
    granted: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrantRecord> for PermissionGrant {
    type Error = RbacError;

    fn try_from(row: GrantRecord) -> Result<Self, Self::Error> {
        Ok(PermissionGrant {
            team_id: TeamId::new(row.team_id),
            role: row.role.parse()?,
            permission: row.permission.parse()?,
            granted: row.granted,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all(rows: Vec<GrantRecord>) -> Result<Vec<PermissionGrant>, RbacError> {
    let mut grants = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<PermissionGrant>, RbacError>>()?;
    sort_grants(&mut grants);
    Ok(grants)
}

#[async_trait]
impl TeamPermissionRepository for SqliteTeamPermissionRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_grant(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<Option<PermissionGrant>, RbacError> {
        let row: Option<GrantRecord> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM team_role_permissions WHERE team_id = ? AND role = ? AND permission = ?"
        ))
        .bind(team_id.as_str())
        .bind(role.as_str())
        .bind(permission.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_grant", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_team_and_role(
        &self,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<Vec<PermissionGrant>, RbacError> {
        let rows: Vec<GrantRecord> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM team_role_permissions WHERE team_id = ? AND role = ?"
        ))
        .bind(team_id.as_str())
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_grants_by_role", e))?;

        convert_all(rows)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<PermissionGrant>, RbacError> {
        let rows: Vec<GrantRecord> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM team_role_permissions WHERE team_id = ?"
        ))
        .bind(team_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("find_grants_by_team", e))?;

        convert_all(rows)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn upsert(
        &self,
        team_id: &TeamId,
        grant: CreateGrant,
    ) -> Result<PermissionGrant, RbacError> {
        let row: GrantRecord = sqlx::query_as(&format!(
            r"
            INSERT INTO team_role_permissions ({COLUMNS}) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (team_id, role, permission)
            DO UPDATE SET granted = excluded.granted, updated_at = excluded.updated_at
            RETURNING {COLUMNS}
            "
        ))
        .bind(team_id.as_str())
        .bind(grant.role.as_str())
        .bind(grant.permission.as_str())
        .bind(grant.granted)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("upsert_grant", e))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, rows), err))]
    async fn insert_missing(
        &self,
        team_id: &TeamId,
        rows: &[CreateGrant],
    ) -> Result<u64, RbacError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("insert_missing_grants", e))?;
        let now = Utc::now();

        let mut written = 0;
        for grant in rows {
            let result = sqlx::query(&format!(
                "INSERT INTO team_role_permissions ({COLUMNS}) VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING"
            ))
            .bind(team_id.as_str())
            .bind(grant.role.as_str())
            .bind(grant.permission.as_str())
            .bind(grant.granted)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("insert_missing_grants", e))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| store_error("insert_missing_grants", e))?;

        Ok(written)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError> {
        let result = sqlx::query(
            "DELETE FROM team_role_permissions WHERE team_id = ? AND role = ? AND permission = ?",
        )
        .bind(team_id.as_str())
        .bind(role.as_str())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("delete_grant", e))?;

        Ok(result.rows_affected() > 0)
    }
}
