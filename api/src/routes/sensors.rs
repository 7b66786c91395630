//! Sensor reading endpoints.
//!
//! - GET  /api/sensors          latest reading, or the default reading when empty
//! - POST /api/ingest           append a reading
//! - GET  /api/readings?n=N     most recent N readings, newest first

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::db::models::SensorReading;
use crate::errors::{AppError, ErrorResponse};
use crate::services::ingest::{self, DEFAULT_READING};

/// Reading payload accepted by the ingest and recommendation endpoints.
/// Every field is optional. Each value may be a JSON number or a numeric
/// string such as `"24.5"`; `null` counts as absent and unknown keys are
/// ignored.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"moisture": 45, "temperature": "24.5", "ph": 6.8, "npk": 120}))]
#[allow(dead_code)] // Documentation schema; bodies are parsed by `services::ingest`
pub struct ReadingInput {
    /// Soil moisture. Number or numeric string.
    pub moisture: Option<f64>,
    /// Soil temperature in Celsius. Number or numeric string.
    pub temperature: Option<f64>,
    /// Soil pH. Number or numeric string.
    pub ph: Option<f64>,
    /// Combined NPK level. Number or numeric string.
    pub npk: Option<f64>,
}

/// A sensor reading as a flat mapping. `id` and `timestamp` are omitted for
/// the default reading served when the store is empty.
#[derive(Debug, Serialize, ToSchema)]
pub struct SensorReadingResponse {
    /// Store-assigned id, strictly increasing in append order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Append time in RFC 3339 format (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub npk: Option<f64>,
}

impl From<SensorReading> for SensorReadingResponse {
    fn from(r: SensorReading) -> Self {
        Self {
            id: Some(r.id),
            timestamp: Some(r.timestamp.to_rfc3339()),
            moisture: r.moisture,
            temperature: r.temperature,
            ph: r.ph,
            npk: r.npk,
        }
    }
}

impl SensorReadingResponse {
    fn default_reading() -> Self {
        Self {
            id: None,
            timestamp: None,
            moisture: Some(DEFAULT_READING.moisture),
            temperature: Some(DEFAULT_READING.temperature),
            ph: Some(DEFAULT_READING.ph),
            npk: Some(DEFAULT_READING.npk),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReadingsQuery {
    /// Number of readings to return (default 50)
    pub n: Option<i64>,
}

/// Get the most recent sensor reading.
///
/// Never reports "no data": an empty store yields the default reading
/// (moisture 0, temperature 0, pH 7.0, NPK 120).
#[utoipa::path(
    get,
    path = "/api/sensors",
    tag = "Sensors",
    responses(
        (status = 200, description = "Latest reading", body = SensorReadingResponse),
    )
)]
pub async fn get_sensors(
    State(state): State<AppState>,
) -> Result<Json<SensorReadingResponse>, AppError> {
    let response = match state.store.latest().await? {
        Some(reading) => SensorReadingResponse::from(reading),
        None => SensorReadingResponse::default_reading(),
    };
    Ok(Json(response))
}

/// Ingest a sensor reading.
///
/// Absent or null fields are stored as null. A present value that is not a
/// finite number rejects the whole reading.
#[utoipa::path(
    post,
    path = "/api/ingest",
    tag = "Sensors",
    request_body = ReadingInput,
    responses(
        (status = 201, description = "Stored reading", body = SensorReadingResponse),
        (status = 400, description = "Malformed reading", body = ErrorResponse),
    )
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SensorReadingResponse>), AppError> {
    let fields = ingest::parse_body(&body)?.ok_or_else(|| {
        AppError::Validation("Request body must be a JSON object".to_string())
    })?;
    let reading = state.store.append(fields).await?;
    tracing::info!(
        "Ingested reading id={} moisture={:?} temperature={:?} ph={:?} npk={:?}",
        reading.id,
        reading.moisture,
        reading.temperature,
        reading.ph,
        reading.npk
    );
    Ok((StatusCode::CREATED, Json(reading.into())))
}

/// List the most recent readings, newest first.
#[utoipa::path(
    get,
    path = "/api/readings",
    tag = "Sensors",
    params(ReadingsQuery),
    responses(
        (status = 200, description = "Recent readings, newest first", body = Vec<SensorReadingResponse>),
        (status = 400, description = "Invalid count", body = ErrorResponse),
    )
)]
pub async fn list_readings(
    State(state): State<AppState>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> Result<Json<Vec<SensorReadingResponse>>, AppError> {
    let Query(query) =
        query.map_err(|e| AppError::Validation(format!("Invalid query: {}", e.body_text())))?;
    let readings = state.store.recent(query.n).await?;
    Ok(Json(readings.into_iter().map(Into::into).collect()))
}
