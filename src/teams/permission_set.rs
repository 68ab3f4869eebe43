//! Resolved permission table for one role in one team.
//!
//! `PermissionSet` is what a caller gets back after catalog defaults and team
//! overrides have been merged: one entry per catalog permission, in catalog
//! order, with overrides winning.

use serde::Serialize;

use crate::catalog::TeamPermission;
use crate::roles::TeamRole;

/// A single resolved cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionEntry {
    pub permission: TeamPermission,
    pub granted: bool,
    /// True when the value is backed by an explicit team row, even one that
    /// repeats the catalog default.
    pub overridden: bool,
}

/// The resolved permissions of a role.
///
/// # Example
///
/// ```rust,ignore
/// let set = store.get_permissions_for_role(&team, TeamRole::Admin).await?;
/// assert!(set.can(TeamPermission::TeamInvite));
/// for permission in set.granted() {
///     println!("{permission}");
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    role: TeamRole,
    entries: Vec<PermissionEntry>,
}

impl PermissionSet {
    pub(crate) fn new(role: TeamRole, entries: Vec<PermissionEntry>) -> Self {
        Self { role, entries }
    }

    pub fn role(&self) -> TeamRole {
        self.role
    }

    /// Whether the role holds `permission`. Permissions outside the
    /// catalog are never held.
    pub fn can(&self, permission: TeamPermission) -> bool {
        self.entries
            .iter()
            .any(|e| e.permission == permission && e.granted)
    }

    /// Granted permissions in catalog order.
    pub fn granted(&self) -> impl Iterator<Item = TeamPermission> + '_ {
        self.entries.iter().filter(|e| e.granted).map(|e| e.permission)
    }

    /// Entries backed by an explicit team row.
    pub fn overrides(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries.iter().filter(|e| e.overridden)
    }

    pub fn entries(&self) -> &[PermissionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
