use diesel::{prelude::*, r2d2};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::PoolSettings;

pub type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type MigrationError = Box<dyn std::error::Error + Send + Sync>;

/// Builds the single process-wide pool. Connections are checked on creation,
/// so an unreachable database fails startup here.
pub fn initialize_db_pool(database_url: &str, settings: &PoolSettings) -> Result<DbPool, r2d2::PoolError> {
    let manager = r2d2::ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(settings.min_idle)
        .max_lifetime(Some(settings.max_lifetime))
        .connection_timeout(settings.connection_timeout)
        .test_on_check_out(true)
        .build(manager)
}

/// Applies every embedded migration that has not been recorded yet, oldest
/// version first. Each migration runs in its own transaction.
pub fn run_migrations(conn: &mut PgConnection) -> Result<usize, MigrationError> {
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in &applied {
        log::info!("applied migration {}", version);
    }
    Ok(applied.len())
}
