//! Test utilities for database integration tests
//!
//! `TestDatabase::in_memory()` gives every test its own migrated SQLite
//! database. `TestDatabase::postgres()` starts a dedicated PostgreSQL
//! container for tests that need the production backend (Docker required).

use crate::DbConnection;
use mayl_migrations::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, ExecResult, QueryResult, Statement};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage, ImageExt};

/// Migrated database handle for tests
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
    /// Keeps the PostgreSQL container alive for the lifetime of the handle
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
}

impl TestDatabase {
    /// Fresh in-memory SQLite database with all migrations applied
    pub async fn in_memory() -> anyhow::Result<Self> {
        let database_url = "sqlite::memory:".to_string();

        let mut opt = ConnectOptions::new(database_url.clone());
        // Every pooled connection to :memory: is a separate database
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            database_url,
            container: None,
        })
    }

    /// Dedicated PostgreSQL container with all migrations applied
    pub async fn postgres() -> anyhow::Result<Self> {
        let db_name = "test_db";
        let username = "test_user";
        let password = "test_password";

        let postgres_container = GenericImage::new("postgres", "17-alpine")
            .with_env_var("POSTGRES_DB", db_name)
            .with_env_var("POSTGRES_USER", username)
            .with_env_var("POSTGRES_PASSWORD", password)
            .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
            .start()
            .await?;

        let port = postgres_container.get_host_port_ipv4(5432).await?;
        let database_url = format!(
            "postgresql://{}:{}@localhost:{}/{}",
            username, password, port, db_name
        );

        // Wait for the database to be ready
        tokio::time::sleep(Duration::from_secs(3)).await;

        let db = Self::connect_with_retry(&database_url, 10).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            database_url,
            container: Some(postgres_container),
        })
    }

    /// Connect to database with retry logic
    async fn connect_with_retry(
        database_url: &str,
        max_retries: u32,
    ) -> anyhow::Result<DbConnection> {
        let mut retries = max_retries;

        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(5)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        loop {
            match Database::connect(opt.clone()).await {
                Ok(db) => return Ok(db),
                Err(e) if retries > 0 => {
                    eprintln!(
                        "Failed to connect to database (retries left: {}): {}",
                        retries, e
                    );
                    retries -= 1;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to database after {} retries: {}",
                        max_retries,
                        e
                    ));
                }
            }
        }
    }

    /// Execute raw SQL for testing
    pub async fn execute_sql(&self, sql: &str) -> anyhow::Result<ExecResult> {
        let statement = Statement::from_string(self.db.get_database_backend(), sql.to_owned());
        Ok(self.db.execute(statement).await?)
    }

    /// Query raw SQL and return results
    pub async fn query_sql(&self, sql: &str) -> anyhow::Result<Vec<QueryResult>> {
        let statement = Statement::from_string(self.db.get_database_backend(), sql.to_owned());
        Ok(self.db.query_all(statement).await?)
    }
}
