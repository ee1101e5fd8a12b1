/// Database abstraction layer
///
/// The `Database` trait is the record store the monitoring engine reads
/// environments from and appends health checks to. `DatabaseImpl` backs
/// it with a local LibSQL file behind a connection pool.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{Environment, HealthCheck, NewHealthCheck, Tier};
pub use repository::{DEFAULT_HISTORY_LIMIT, Database, DatabaseImpl, MAX_HISTORY_LIMIT};

use anyhow::Result;

use crate::pool::{LibsqlManager, LibsqlPool};

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<(), crate::error::StoreError> {
    migrations::run_migrations(conn).await
}

/// Open (or create) the database file at `path`, build the pool and
/// bring the schema up to date
pub async fn open(path: &str) -> Result<LibsqlPool> {
    let database = libsql::Builder::new_local(path).build().await?;
    let pool: LibsqlPool = LibsqlPool::builder(LibsqlManager::new(database)).build()?;

    let conn = pool.get().await.map_err(crate::error::StoreError::from)?;
    initialize_database(&conn).await?;

    Ok(pool)
}
