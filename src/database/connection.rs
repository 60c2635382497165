//! Database connection management

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::utils::errors::SentinelError;

pub type DatabasePool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bard_sentinel.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::DatabaseConfig> for DatabaseConfig {
    fn from(config: &crate::config::DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            ..Self::default()
        }
    }
}

impl DatabaseConfig {
    /// Single-connection in-memory database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Create a new database connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, SentinelError> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to :memory: is a separate database
    let max_connections = if config.is_in_memory() {
        1
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        config.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!(url = %config.url, "Database connection pool created successfully");
    Ok(pool)
}

/// Create tables and apply ad hoc column migrations
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), SentinelError> {
    tracing::info!("Running database migrations...");

    for statement in super::schema::CREATE_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    for statement in super::schema::COLUMN_MIGRATIONS {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            if is_duplicate_column(&e) {
                tracing::debug!(statement = %statement, "Column already present, skipping migration");
            } else {
                return Err(e.into());
            }
        }
    }

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

fn is_duplicate_column(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.message().contains("duplicate column"),
        _ => false,
    }
}

/// Check database health
pub async fn health_check(pool: &DatabasePool) -> Result<(), SentinelError> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}
