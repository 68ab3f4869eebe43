//! In-process repository implementations.
//!
//! Suitable for tests, single-node deployments and as a reference for other
//! backends. Handles are cheap to clone and share the same state, so a single
//! repository can serve concurrent tasks.

mod membership;
mod permission;

pub use membership::InMemoryTeamMembershipRepository;
pub use permission::InMemoryTeamPermissionRepository;

use crate::RbacError;

fn poisoned<T>(_: T) -> RbacError {
    log::error!(target: "teamgate", "msg=\"in-memory store lock poisoned\"");
    RbacError::StoreUnavailable("lock poisoned".into())
}
