//! # Migrations
//!
//! Schema files under `migrations/sqlite/` at the workspace root, compiled
//! into the binary by `sqlx::migrate!`.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   users, products, carts, cart_items
//! ```
//!
//! sqlx records each applied file (with its checksum) in
//! `_sqlx_migrations`, so startup only runs what is new. Applied files are
//! frozen: schema changes go in a new `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
