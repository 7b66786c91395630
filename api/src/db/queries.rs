use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{ReadingFields, SensorReading};

/// Insert a new reading (append-only) and return the stored row.
pub async fn insert_reading(
    pool: &SqlitePool,
    fields: &ReadingFields,
    timestamp: DateTime<Utc>,
) -> Result<SensorReading, sqlx::Error> {
    sqlx::query_as::<_, SensorReading>(
        "INSERT INTO sensor_readings (timestamp, moisture, temperature, ph, npk)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, timestamp, moisture, temperature, ph, npk",
    )
    .bind(timestamp)
    .bind(fields.moisture)
    .bind(fields.temperature)
    .bind(fields.ph)
    .bind(fields.npk)
    .fetch_one(pool)
    .await
}

/// Get the reading with the greatest id, if any.
pub async fn latest_reading(pool: &SqlitePool) -> Result<Option<SensorReading>, sqlx::Error> {
    sqlx::query_as::<_, SensorReading>(
        "SELECT id, timestamp, moisture, temperature, ph, npk
         FROM sensor_readings
         ORDER BY id DESC
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Get the `limit` most recent readings, newest first.
pub async fn recent_readings(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<SensorReading>, sqlx::Error> {
    sqlx::query_as::<_, SensorReading>(
        "SELECT id, timestamp, moisture, temperature, ph, npk
         FROM sensor_readings
         ORDER BY id DESC
         LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
