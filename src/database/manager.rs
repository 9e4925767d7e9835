use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::filter::FilterError;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Migration failed: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return DatabaseError::Conflict("Duplicate field value entered".to_string());
            }
        }
        DatabaseError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

/// Pool construction and schema management
pub struct DatabaseManager;

impl DatabaseManager {
    /// Build the pool without opening a connection, so the server starts even
    /// when the database is briefly unavailable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = Self::database_url(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&url)?;
        info!("Configured database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Validated connection string from configuration
    pub fn database_url(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        let raw = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url.into()),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Apply embedded migrations from `migrations/`
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            url: url.map(str::to_string),
            max_connections: 5,
            connection_timeout: 1,
            run_migrations: false,
        }
    }

    #[test]
    fn database_url_requires_configuration() {
        assert!(matches!(
            DatabaseManager::database_url(&config(None)),
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }

    #[test]
    fn database_url_requires_postgres_scheme() {
        assert!(DatabaseManager::database_url(&config(Some("postgres://u:p@localhost:5432/devcamper"))).is_ok());
        assert!(DatabaseManager::database_url(&config(Some("postgresql://localhost/devcamper"))).is_ok());
        assert!(matches!(
            DatabaseManager::database_url(&config(Some("mysql://localhost/devcamper"))),
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
        assert!(matches!(
            DatabaseManager::database_url(&config(Some("not a url"))),
            Err(DatabaseError::InvalidDatabaseUrl)
        ));
    }

    #[test]
    fn row_not_found_is_not_a_conflict() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DatabaseError::Sqlx(_)));
    }

    #[tokio::test]
    async fn lazy_pool_builds_without_a_server() {
        let pool = DatabaseManager::connect_lazy(&config(Some("postgres://u:p@127.0.0.1:1/none")));
        assert!(pool.is_ok());
    }
}
