//! Database connection management

use mayl_core::{ServiceError, ServiceResult};
use mayl_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tracing::debug;

pub type DbConnection = DatabaseConnection;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 100;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 5;

pub async fn establish_connection(database_url: &str) -> ServiceResult<Arc<DbConnection>> {
    establish_connection_with_pool(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS)
        .await
}

/// Open the process-wide pool and bring the schema up to date
pub async fn establish_connection_with_pool(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> ServiceResult<Arc<DbConnection>> {
    if max_connections == 0 || min_connections > max_connections {
        return Err(ServiceError::Configuration {
            message: format!(
                "invalid pool size: min {} / max {}",
                min_connections, max_connections
            ),
        });
    }

    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    // Run migrations
    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    debug!(
        "Database pool ready (max: {}, min: {})",
        max_connections, min_connections
    );

    Ok(Arc::new(db))
}
