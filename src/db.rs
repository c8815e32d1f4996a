//! Database module - SQLite connection and migrations

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Single predictions (append-only)
CREATE TABLE IF NOT EXISTS user_predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    input_data TEXT NOT NULL,
    predicted_region TEXT,
    confidence REAL,
    status TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL
);

-- Batch prediction rows (append-only)
CREATE TABLE IF NOT EXISTS batch_predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    row_data TEXT NOT NULL,
    predicted_region TEXT,
    confidence REAL,
    status TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_user_pred_created ON user_predictions(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_batch_pred_created ON batch_predictions(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_user_pred_region ON user_predictions(predicted_region);
CREATE INDEX IF NOT EXISTS idx_batch_pred_region ON batch_predictions(predicted_region);
"#;
