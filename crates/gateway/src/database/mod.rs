//! SeaORM-based database connection management.
//!
//! Supports SQLite, PostgreSQL and MySQL through the same connection type,
//! following the multi-backend detection pattern used throughout this
//! project's persistence layer.

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseBackend, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub mod migrations;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
    pub backend: DatabaseBackend,
    pub database_type: DatabaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Database {
    /// Attempts to connect, returning `None` rather than propagating the
    /// error when the database is unreachable, so the caller can fall back
    /// to the in-memory job store and audit store per the
    /// startup-degradation contract instead of aborting the process.
    /// Malformed configuration (e.g. an unsupported URL scheme) is still a
    /// hard error — that is a deployment bug, not a transient outage.
    pub async fn try_connect(config: &DatabaseConfig) -> Result<Option<Self>> {
        match Self::new(config).await {
            Ok(db) => Ok(Some(db)),
            Err(e) => {
                if Self::detect_database_type(&config.url).is_err() {
                    return Err(e);
                }
                tracing::error!(error = %e, "database unreachable at startup");
                Ok(None)
            }
        }
    }

    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_type = Self::detect_database_type(&config.url)?;
        let backend = match database_type {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        };

        info!("connecting to {} database", database_type.as_str());

        let connection_url = match database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&config.url)?,
            _ => config.url.clone(),
        };

        let mut options = ConnectOptions::new(&connection_url);
        options
            .max_connections(config.max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let connection = SeaOrmDatabase::connect(options)
            .await
            .with_context(|| format!("failed to connect to database at '{}'", config.url))?;

        debug!("database connection established");

        Ok(Self {
            connection: Arc::new(connection),
            backend,
            database_type,
        })
    }

    fn detect_database_type(url: &str) -> Result<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            anyhow::bail!("unsupported database URL format: {url}");
        }
    }

    /// SQLite needs `mode=rwc` to auto-create the file, and the parent
    /// directory must exist before the driver will even try.
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        if url.contains("mode=") || url.contains(":memory:") {
            return Ok(url.to_string());
        }

        let file_path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .ok_or_else(|| anyhow::anyhow!("invalid SQLite URL format: {url}"))?;

        let path = std::path::Path::new(file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory for SQLite database: {}", parent.display())
                })?;
            }
        }

        let auto_create_url = if url.contains('?') {
            format!("{url}&mode=rwc")
        } else {
            format!("{url}?mode=rwc")
        };
        Ok(auto_create_url)
    }

    pub async fn migrate(&self) -> Result<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!("running database migrations for {}", self.database_type.as_str());
        Migrator::up(&*self.connection, None)
            .await
            .context("failed to run migrations")?;
        info!("database migrations completed");
        Ok(())
    }

    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }
}
