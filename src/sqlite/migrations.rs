//! Bundled `SQLite` migrations.
//!
//! ```rust,ignore
//! use teamgate::sqlite::migrations;
//!
//! migrations::run(&pool).await?;
//! ```

use sqlx::{Executor, SqlitePool};

const TEAMS_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260301000001_create_team_memberships_table",
        include_str!(
            "../../migrations_sqlite/teams/20260301000001_create_team_memberships_table.sql"
        ),
    ),
    (
        "20260301000002_create_team_role_permissions_table",
        include_str!(
            "../../migrations_sqlite/teams/20260301000002_create_team_role_permissions_table.sql"
        ),
    ),
];

/// Runs every pending migration, tracked in `_teamgate_migrations`.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _teamgate_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    run_migrations(pool, TEAMS_MIGRATIONS).await
}

/// Statements are split on `;`, so migration files must not contain
/// semicolons inside string literals.
async fn run_migrations(pool: &SqlitePool, migrations: &[(&str, &str)]) -> Result<(), sqlx::Error> {
    for (name, sql) in migrations {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _teamgate_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;

        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&mut *tx).await?;
            }
        }
        sqlx::query("INSERT INTO _teamgate_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(target: "teamgate", "msg=\"migration applied\", name={name}");
    }
    Ok(())
}
