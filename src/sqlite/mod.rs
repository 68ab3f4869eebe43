//! `SQLite` repositories. Enable the `sqlx_sqlite` feature to use them.
//!
//! Run [`migrations::run`] once before constructing the repositories.

mod membership;
pub mod migrations;
mod permission;

pub use membership::SqliteTeamMembershipRepository;
pub use permission::SqliteTeamPermissionRepository;

use sqlx::SqlitePool;

use crate::RbacError;

/// Creates both repositories over one pool.
pub fn create_repositories(
    pool: SqlitePool,
) -> (SqliteTeamMembershipRepository, SqliteTeamPermissionRepository) {
    (
        SqliteTeamMembershipRepository::new(pool.clone()),
        SqliteTeamPermissionRepository::new(pool),
    )
}

fn store_error(operation: &str, e: sqlx::Error) -> RbacError {
    log::error!(
        target: "teamgate",
        "msg=\"database error\", backend=\"sqlite\", operation=\"{operation}\", error=\"{e}\""
    );
    RbacError::StoreUnavailable(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
