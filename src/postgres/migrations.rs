//! Bundled `PostgreSQL` migrations, embedded with `sqlx::migrate!`.
//!
//! ```rust,ignore
//! use teamgate::postgres::migrations;
//!
//! migrations::run(&pool).await?;
//! ```

use sqlx::PgPool;

/// Runs the team migrations:
/// - `team_memberships` (one owner per team via a partial unique index)
/// - `team_role_permissions`
pub async fn run(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations/teams").run(pool).await
}
