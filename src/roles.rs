//! The fixed team role hierarchy.
//!
//! Roles are totally ordered by authority: `owner > admin > moderator > member`.
//! Authority is expressed as an explicit [`TeamRole::rank`] per role rather
//! than a position in a list, so adding a role cannot silently reorder the
//! others.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RbacError;

/// A role a member holds within one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Owner,
    Admin,
    Moderator,
    Member,
}

/// Result of comparing the authority of two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// The left-hand role has more authority.
    Higher,
    Equal,
    /// The left-hand role has less authority.
    Lower,
}

impl TeamRole {
    /// All roles, highest authority first.
    pub const ALL: [TeamRole; 4] = [Self::Owner, Self::Admin, Self::Moderator, Self::Member];

    /// Authority level of this role. Lower is more authority; owner is 0.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Owner => 0,
            Self::Admin => 1,
            Self::Moderator => 2,
            Self::Member => 3,
        }
    }

    /// Compares the authority of `self` against `other`.
    pub fn compare(self, other: TeamRole) -> Authority {
        match self.rank().cmp(&other.rank()) {
            Ordering::Less => Authority::Higher,
            Ordering::Equal => Authority::Equal,
            Ordering::Greater => Authority::Lower,
        }
    }

    /// Returns true if this role has at least the authority of `minimum`.
    pub fn is_at_least(self, minimum: TeamRole) -> bool {
        self.rank() <= minimum.rank()
    }

    /// Returns true if this role strictly outranks `other`.
    ///
    /// A role never outranks itself.
    pub fn outranks(self, other: TeamRole) -> bool {
        self.rank() < other.rank()
    }

    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }

    /// Storage and wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Member => "member",
        }
    }
}

impl FromStr for TeamRole {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "member" => Ok(Self::Member),
            other => Err(RbacError::UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_are_strictly_increasing_in_canonical_order() {
        let ranks: Vec<u8> = TeamRole::ALL.iter().map(|r| r.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_compare() {
        assert_eq!(TeamRole::Owner.compare(TeamRole::Admin), Authority::Higher);
        assert_eq!(TeamRole::Moderator.compare(TeamRole::Moderator), Authority::Equal);
        assert_eq!(TeamRole::Member.compare(TeamRole::Admin), Authority::Lower);
    }

    #[test]
    fn test_is_at_least_boundary() {
        assert!(TeamRole::Moderator.is_at_least(TeamRole::Moderator));
        assert!(TeamRole::Admin.is_at_least(TeamRole::Moderator));
        assert!(!TeamRole::Member.is_at_least(TeamRole::Moderator));
    }

    #[test]
    fn test_outranks_is_strict() {
        for role in TeamRole::ALL {
            assert!(!role.outranks(role));
        }
        assert!(TeamRole::Owner.outranks(TeamRole::Member));
        assert!(!TeamRole::Member.outranks(TeamRole::Owner));
    }

    #[test]
    fn test_parse_roundtrip() {
        for role in TeamRole::ALL {
            assert_eq!(role.as_str().parse::<TeamRole>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_is_an_error() {
        assert_eq!(
            "superuser".parse::<TeamRole>(),
            Err(RbacError::UnknownRole("superuser".to_owned()))
        );
        // case matters; storage is lowercase
        assert!("Owner".parse::<TeamRole>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&TeamRole::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
    }
}
