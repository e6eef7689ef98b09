//! SQLite pool setup and schema

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Connection settings for the SQLite backing store
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL, e.g. `sqlite://remit.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// In-memory database for tests. A single connection is required:
    /// every pooled connection would otherwise see its own empty database.
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Open the pool and create the schema if it does not exist yet
pub async fn connect(config: &SqliteConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!(url = %config.url, "sqlite store ready");
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // seq doubles as the FIFO tie-breaker within a priority band
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS queue_jobs (
            seq    INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL UNIQUE,
            score  INTEGER NOT NULL,
            job    TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_jobs_order ON queue_jobs (score, seq)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dead_letter_jobs (
            job_id      TEXT PRIMARY KEY,
            job         TEXT NOT NULL,
            reason      TEXT NOT NULL,
            failed_at   TEXT NOT NULL,
            payment_ref TEXT NOT NULL,
            retry_count INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
