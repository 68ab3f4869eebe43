//! `PostgreSQL` repositories. Enable the `sqlx_postgres` feature to use them.

mod membership;
pub mod migrations;
mod permission;

pub use membership::PostgresTeamMembershipRepository;
pub use permission::PostgresTeamPermissionRepository;

use sqlx::PgPool;

use crate::RbacError;

/// Creates both repositories over one pool.
pub fn create_repositories(
    pool: PgPool,
) -> (PostgresTeamMembershipRepository, PostgresTeamPermissionRepository) {
    (
        PostgresTeamMembershipRepository::new(pool.clone()),
        PostgresTeamPermissionRepository::new(pool),
    )
}

fn store_error(operation: &str, e: sqlx::Error) -> RbacError {
    log::error!(
        target: "teamgate",
        "msg=\"database error\", backend=\"postgres\", operation=\"{operation}\", error=\"{e}\""
    );
    RbacError::StoreUnavailable(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
