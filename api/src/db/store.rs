//! Durable append-only reading log.
//!
//! Wraps the SQLite pool with a single-writer lock so ids are assigned in the
//! same order appends are accepted. Reads bypass the lock and see whatever
//! has been committed.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use super::models::{ReadingFields, SensorReading};
use super::queries;
use crate::errors::AppError;

/// Number of readings returned by `recent` when the caller gives no count.
pub const DEFAULT_RECENT_LIMIT: i64 = 50;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ReadingStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl ReadingStore {
    /// Open (creating if needed) the database file and run migrations.
    ///
    /// WAL with `synchronous=FULL` makes every committed append durable
    /// before the insert returns.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(DB_POOL_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        tracing::info!("Opened reading store at {}", path.display());
        Self::from_pool(pool).await
    }

    /// In-memory store on a single pinned connection, for tests.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!().run(&pool).await?;
        tracing::info!("Database migrations completed");
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a reading. Absent fields stay `NULL`; present fields must be finite.
    pub async fn append(&self, fields: ReadingFields) -> Result<SensorReading, AppError> {
        for (name, value) in fields.named() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(AppError::Validation(format!(
                        "{} must be a finite number, got {}",
                        name, v
                    )));
                }
            }
        }

        let _guard = self.write_lock.lock().await;
        let reading = queries::insert_reading(&self.pool, &fields, Utc::now()).await?;
        tracing::debug!("Appended reading id={}", reading.id);
        Ok(reading)
    }

    pub async fn latest(&self) -> Result<Option<SensorReading>, AppError> {
        Ok(queries::latest_reading(&self.pool).await?)
    }

    /// The `n` most recent readings, newest first (`DEFAULT_RECENT_LIMIT` when `None`).
    pub async fn recent(&self, n: Option<i64>) -> Result<Vec<SensorReading>, AppError> {
        let n = n.unwrap_or(DEFAULT_RECENT_LIMIT);
        if n < 0 {
            return Err(AppError::Validation(format!(
                "n must be non-negative, got {}",
                n
            )));
        }
        Ok(queries::recent_readings(&self.pool, n).await?)
    }
}
