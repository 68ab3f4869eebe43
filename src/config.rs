//! Configuration for the authorization engine.
//!
//! # Example
//!
//! ```rust
//! use teamgate::config::{OwnershipConfig, RbacConfig};
//! use teamgate::TeamRole;
//!
//! // Use defaults
//! let config = RbacConfig::default();
//!
//! // Or customize
//! let config = RbacConfig {
//!     ownership: OwnershipConfig {
//!         successor_role: TeamRole::Moderator,
//!     },
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::RbacError;
use crate::roles::TeamRole;

/// Main configuration struct.
#[derive(Debug, Clone)]
pub struct RbacConfig {
    /// Ownership transfer settings.
    pub ownership: OwnershipConfig,

    /// Write the catalog defaults as explicit grant rows when a team is
    /// founded through the engine.
    ///
    /// Default: false (absent rows already resolve to catalog defaults)
    pub initialize_on_found: bool,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            ownership: OwnershipConfig::default(),
            initialize_on_found: false,
        }
    }
}

impl RbacConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the configuration for values that would break invariants.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the ownership successor role is `owner`.
    pub fn validate(&self) -> Result<(), RbacError> {
        self.ownership.validate()
    }
}

/// Configuration for ownership transfer.
#[derive(Debug, Clone)]
pub struct OwnershipConfig {
    /// Role the previous owner receives after handing the team over.
    ///
    /// Default: admin
    pub successor_role: TeamRole,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            successor_role: TeamRole::Admin,
        }
    }
}

impl OwnershipConfig {
    pub fn validate(&self) -> Result<(), RbacError> {
        if self.successor_role.is_owner() {
            return Err(RbacError::InvalidConfig(
                "ownership successor role cannot be owner".into(),
            ));
        }
        Ok(())
    }
}
