//! The closed catalog of team permissions.
//!
//! Every permission the engine can check is a [`TeamPermission`] variant, and
//! every variant a process accepts is listed in its [`PermissionCatalog`]
//! together with the roles that receive it by default. The catalog is built
//! once at startup, validated, and shared read-only afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RbacError;
use crate::roles::TeamRole;

/// A team-scoped capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamPermission {
    #[serde(rename = "team.view")]
    TeamView,
    #[serde(rename = "team.manage")]
    TeamManage,
    #[serde(rename = "team.invite")]
    TeamInvite,
    #[serde(rename = "team.members.view")]
    MembersView,
    #[serde(rename = "team.members.remove")]
    MembersRemove,
    #[serde(rename = "team.roles.manage")]
    RolesManage,
    #[serde(rename = "team.chat.send")]
    ChatSend,
    #[serde(rename = "team.chat.moderate")]
    ChatModerate,
}

impl TeamPermission {
    /// Every permission known to this build, in catalog order.
    pub const ALL: [TeamPermission; 8] = [
        Self::TeamView,
        Self::TeamManage,
        Self::TeamInvite,
        Self::MembersView,
        Self::MembersRemove,
        Self::RolesManage,
        Self::ChatSend,
        Self::ChatModerate,
    ];

    /// Dotted identifier used in storage and on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TeamView => "team.view",
            Self::TeamManage => "team.manage",
            Self::TeamInvite => "team.invite",
            Self::MembersView => "team.members.view",
            Self::MembersRemove => "team.members.remove",
            Self::RolesManage => "team.roles.manage",
            Self::ChatSend => "team.chat.send",
            Self::ChatModerate => "team.chat.moderate",
        }
    }
}

impl FromStr for TeamPermission {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| RbacError::UnknownPermission(s.to_owned()))
    }
}

impl fmt::Display for TeamPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub permission: TeamPermission,
    pub description: String,
    /// Roles granted this permission when a team has no override.
    pub default_roles: Vec<TeamRole>,
}

impl PermissionDefinition {
    pub fn is_default_for(&self, role: TeamRole) -> bool {
        self.default_roles.contains(&role)
    }
}

/// The process-wide list of valid permissions and their default grants.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    entries: Vec<PermissionDefinition>,
}

impl PermissionCatalog {
    /// The catalog shipped with this crate.
    ///
    /// `team.manage` defaults to the owner alone, so an owner who hands over
    /// the team loses it unless a team override says otherwise.
    pub fn standard() -> Self {
        use TeamRole::{Admin, Member, Moderator, Owner};

        let everyone = [Owner, Admin, Moderator, Member];
        Self {
            entries: vec![
                definition(TeamPermission::TeamView, "View team profile and settings", &everyone),
                definition(
                    TeamPermission::TeamManage,
                    "Edit team settings and role permissions",
                    &[Owner],
                ),
                definition(
                    TeamPermission::TeamInvite,
                    "Invite new members to the team",
                    &[Owner, Admin],
                ),
                definition(TeamPermission::MembersView, "View the member list", &everyone),
                definition(
                    TeamPermission::MembersRemove,
                    "Remove members from the team",
                    &[Owner, Admin],
                ),
                definition(
                    TeamPermission::RolesManage,
                    "Change the roles of other members",
                    &[Owner, Admin],
                ),
                definition(TeamPermission::ChatSend, "Post messages in team chat", &everyone),
                definition(
                    TeamPermission::ChatModerate,
                    "Delete or pin messages in team chat",
                    &[Owner, Admin, Moderator],
                ),
            ],
        }
    }

    /// Starts an empty catalog for applications with their own defaults.
    pub fn builder() -> PermissionCatalogBuilder {
        PermissionCatalogBuilder::new()
    }

    /// All entries in catalog order.
    pub fn list_permissions(&self) -> &[PermissionDefinition] {
        &self.entries
    }

    pub fn is_valid_permission(&self, id: &str) -> bool {
        self.parse(id).is_ok()
    }

    /// Resolves a permission identifier against this catalog.
    pub fn parse(&self, id: &str) -> Result<TeamPermission, RbacError> {
        let permission: TeamPermission = id.parse()?;
        self.ensure(permission)?;
        Ok(permission)
    }

    /// Fails with `UnknownPermission` unless `permission` is listed here.
    pub fn ensure(&self, permission: TeamPermission) -> Result<(), RbacError> {
        self.definition(permission).map(|_| ())
    }

    pub fn definition(&self, permission: TeamPermission) -> Result<&PermissionDefinition, RbacError> {
        self.entries
            .iter()
            .find(|d| d.permission == permission)
            .ok_or_else(|| RbacError::UnknownPermission(permission.as_str().to_owned()))
    }

    /// Whether `role` holds `permission` when a team has no override.
    pub fn default_grant(&self, role: TeamRole, permission: TeamPermission) -> Result<bool, RbacError> {
        Ok(self.definition(permission)?.is_default_for(role))
    }

    /// Every (role, permission, default) cell, roles outermost.
    pub fn default_table(&self) -> impl Iterator<Item = (TeamRole, TeamPermission, bool)> + '_ {
        TeamRole::ALL.into_iter().flat_map(move |role| {
            self.entries
                .iter()
                .map(move |d| (role, d.permission, d.is_default_for(role)))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn definition(permission: TeamPermission, description: &str, roles: &[TeamRole]) -> PermissionDefinition {
    PermissionDefinition {
        permission,
        description: description.to_owned(),
        default_roles: roles.to_vec(),
    }
}

/// Builder for custom catalogs. Validation happens in [`build`](Self::build).
#[must_use]
#[derive(Debug, Default)]
pub struct PermissionCatalogBuilder {
    entries: Vec<PermissionDefinition>,
}

impl PermissionCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permission with its description and default roles.
    pub fn permission(
        mut self,
        permission: TeamPermission,
        description: impl Into<String>,
        default_roles: &[TeamRole],
    ) -> Self {
        self.entries.push(PermissionDefinition {
            permission,
            description: description.into(),
            default_roles: default_roles.to_vec(),
        });
        self
    }

    /// Validates and freezes the catalog.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the catalog is empty, lists a permission twice,
    /// or has an entry without a description.
    pub fn build(self) -> Result<PermissionCatalog, RbacError> {
        if self.entries.is_empty() {
            return Err(RbacError::InvalidConfig("permission catalog is empty".into()));
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.description.trim().is_empty() {
                return Err(RbacError::InvalidConfig(format!(
                    "permission {} has no description",
                    entry.permission
                )));
            }
            if self.entries[..i].iter().any(|e| e.permission == entry.permission) {
                return Err(RbacError::InvalidConfig(format!(
                    "permission {} is listed twice",
                    entry.permission
                )));
            }
        }

        let mut entries = self.entries;
        for entry in &mut entries {
            entry.default_roles.sort_by_key(|r| r.rank());
            entry.default_roles.dedup();
        }

        Ok(PermissionCatalog { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_lists_every_permission_in_order() {
        let catalog = PermissionCatalog::standard();
        let listed: Vec<TeamPermission> = catalog
            .list_permissions()
            .iter()
            .map(|d| d.permission)
            .collect();
        assert_eq!(listed, TeamPermission::ALL.to_vec());
    }

    #[test]
    fn test_is_valid_permission() {
        let catalog = PermissionCatalog::standard();
        assert!(catalog.is_valid_permission("team.invite"));
        assert!(catalog.is_valid_permission("team.chat.moderate"));
        assert!(!catalog.is_valid_permission("team.launch_missiles"));
        assert!(!catalog.is_valid_permission(""));
    }

    #[test]
    fn test_default_grants() {
        let catalog = PermissionCatalog::standard();
        assert!(catalog.default_grant(TeamRole::Admin, TeamPermission::TeamInvite).unwrap());
        assert!(!catalog.default_grant(TeamRole::Member, TeamPermission::TeamInvite).unwrap());
        assert!(!catalog.default_grant(TeamRole::Admin, TeamPermission::TeamManage).unwrap());
        assert!(catalog.default_grant(TeamRole::Owner, TeamPermission::TeamManage).unwrap());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let catalog = PermissionCatalog::standard();
        assert_eq!(
            catalog.parse("team.delete"),
            Err(RbacError::UnknownPermission("team.delete".into()))
        );
        assert_eq!(catalog.parse("team.members.view"), Ok(TeamPermission::MembersView));
    }

    #[test]
    fn test_custom_catalog_narrows_valid_set() {
        let catalog = PermissionCatalog::builder()
            .permission(TeamPermission::TeamManage, "Manage", &[TeamRole::Owner, TeamRole::Admin])
            .build()
            .unwrap();

        assert!(catalog.is_valid_permission("team.manage"));
        // known to the enum but not to this catalog
        assert!(!catalog.is_valid_permission("team.invite"));
        assert_eq!(
            catalog.ensure(TeamPermission::TeamInvite),
            Err(RbacError::UnknownPermission("team.invite".into()))
        );
    }

    #[test]
    fn test_builder_rejects_duplicates_and_empty() {
        let dup = PermissionCatalog::builder()
            .permission(TeamPermission::TeamView, "View", &[TeamRole::Member])
            .permission(TeamPermission::TeamView, "View again", &[TeamRole::Admin])
            .build();
        assert!(matches!(dup, Err(RbacError::InvalidConfig(_))));

        assert!(matches!(
            PermissionCatalog::builder().build(),
            Err(RbacError::InvalidConfig(_))
        ));

        let blank = PermissionCatalog::builder()
            .permission(TeamPermission::TeamView, "  ", &[TeamRole::Member])
            .build();
        assert!(matches!(blank, Err(RbacError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_table_covers_every_cell() {
        let catalog = PermissionCatalog::standard();
        let cells: Vec<_> = catalog.default_table().collect();
        assert_eq!(cells.len(), TeamRole::ALL.len() * catalog.len());
        assert!(cells.contains(&(TeamRole::Moderator, TeamPermission::ChatModerate, true)));
        assert!(cells.contains(&(TeamRole::Member, TeamPermission::ChatModerate, false)));
    }

    #[test]
    fn test_permission_serde_uses_dotted_ids() {
        let json = serde_json::to_string(&TeamPermission::MembersRemove).unwrap();
        assert_eq!(json, "\"team.members.remove\"");
        let parsed: TeamPermission = serde_json::from_str("\"team.chat.send\"").unwrap();
        assert_eq!(parsed, TeamPermission::ChatSend);
    }
}
