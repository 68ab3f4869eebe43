use std::sync::Arc;

use super::permission_set::{PermissionEntry, PermissionSet};
use super::repository::{CreateGrant, TeamPermissionRepository};
use super::types::{PermissionGrant, TeamId};
use crate::RbacError;
use crate::catalog::{PermissionCatalog, TeamPermission};
use crate::roles::TeamRole;

/// Per-team, per-role permission table layered over the catalog defaults.
///
/// Storage only: this type does not check who is asking. Callers that mutate
/// grants must already have passed the engine's `team.manage` check.
pub struct TeamPermissionStore<P>
where
    P: TeamPermissionRepository,
{
    repo: P,
    catalog: Arc<PermissionCatalog>,
}

impl<P: TeamPermissionRepository> TeamPermissionStore<P> {
    pub fn new(repo: P, catalog: Arc<PermissionCatalog>) -> Self {
        Self { repo, catalog }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn repository(&self) -> &P {
        &self.repo
    }

    /// Whether `role` holds `permission` in `team_id`.
    ///
    /// An explicit override wins; otherwise the catalog default applies.
    ///
    /// # Errors
    ///
    /// `UnknownPermission` if the permission is not in the catalog; the
    /// store is not consulted in that case.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn has_permission(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError> {
        let default = self.catalog.default_grant(role, permission)?;

        let granted = self
            .repo
            .find_grant(team_id, role, permission)
            .await?
            .map_or(default, |grant| grant.granted);

        Ok(granted)
    }

    /// Resolves every catalog permission for `role`, in catalog order.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn get_permissions_for_role(
        &self,
        team_id: &TeamId,
        role: TeamRole,
    ) -> Result<PermissionSet, RbacError> {
        let overrides = self.repo.find_by_team_and_role(team_id, role).await?;

        let entries = self
            .catalog
            .list_permissions()
            .iter()
            .map(|definition| {
                let explicit = overrides
                    .iter()
                    .find(|g| g.permission == definition.permission);
                PermissionEntry {
                    permission: definition.permission,
                    granted: explicit.map_or_else(|| definition.is_default_for(role), |g| g.granted),
                    overridden: explicit.is_some(),
                }
            })
            .collect();

        Ok(PermissionSet::new(role, entries))
    }

    /// Writes an explicit override. Repeating the same call is a no-op.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn set_permission(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
        granted: bool,
    ) -> Result<PermissionGrant, RbacError> {
        self.catalog.ensure(permission)?;

        let grant = self
            .repo
            .upsert(
                team_id,
                CreateGrant {
                    role,
                    permission,
                    granted,
                },
            )
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"permission override set\", team_id={team_id}, role={role}, permission={permission}, granted={granted}"
        );

        Ok(grant)
    }

    /// Drops an override so the catalog default applies again.
    ///
    /// Returns whether an override existed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn reset_permission(
        &self,
        team_id: &TeamId,
        role: TeamRole,
        permission: TeamPermission,
    ) -> Result<bool, RbacError> {
        self.catalog.ensure(permission)?;

        let existed = self.repo.delete(team_id, role, permission).await?;

        if existed {
            log::info!(
                target: "teamgate",
                "msg=\"permission override removed\", team_id={team_id}, role={role}, permission={permission}"
            );
        }

        Ok(existed)
    }

    /// Writes a row holding the catalog default for every (role, permission)
    /// cell that has none. Existing rows, including overrides, are kept.
    ///
    /// Safe to call repeatedly and concurrently. Returns the number of rows
    /// written by this call.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn initialize_defaults(&self, team_id: &TeamId) -> Result<u64, RbacError> {
        let grants: Vec<CreateGrant> = self
            .catalog
            .default_table()
            .map(|(role, permission, granted)| CreateGrant {
                role,
                permission,
                granted,
            })
            .collect();

        let written = self.repo.insert_missing(team_id, &grants).await?;

        log::info!(
            target: "teamgate",
            "msg=\"permission defaults initialized\", team_id={team_id}, rows_written={written}"
        );

        Ok(written)
    }

    /// Every explicit row stored for a team.
    pub async fn list_overrides(&self, team_id: &TeamId) -> Result<Vec<PermissionGrant>, RbacError> {
        self.repo.find_by_team(team_id).await
    }
}

/// True iff `manager` strictly outranks `target`.
///
/// No role manages its own rank, so two admins cannot change each other
/// and nobody manages the owner.
pub fn can_manage_role(manager: TeamRole, target: TeamRole) -> bool {
    manager.outranks(target)
}
