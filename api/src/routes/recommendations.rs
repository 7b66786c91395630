//! POST /api/recommendations: crop recommendations for a reading.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::db::models::ReadingFields;
use crate::errors::{AppError, ErrorResponse};
use crate::services::composer::RecommendationResult;
use crate::services::ingest;

/// Recommend crops for a reading.
///
/// Each field comes from the request body if given, otherwise from the
/// latest stored reading, otherwise from the default reading.
#[utoipa::path(
    post,
    path = "/api/recommendations",
    tag = "Recommendations",
    request_body(
        content = super::sensors::ReadingInput,
        description = "Optional reading; omitted fields fall back to the latest stored reading"
    ),
    responses(
        (status = 200, description = "Inferred soil type and ranked crops", body = RecommendationResult),
        (status = 400, description = "Malformed reading", body = ErrorResponse),
        (status = 500, description = "Prediction failed", body = ErrorResponse),
        (status = 503, description = "Models not loaded", body = ErrorResponse),
    )
)]
pub async fn recommend(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RecommendationResult>, AppError> {
    let explicit = ingest::parse_body(&body)?.unwrap_or_default();

    let stage = state.inference.as_ref().ok_or_else(|| {
        AppError::ModelUnavailable("models failed to load at startup".to_string())
    })?;

    let stored = if explicit.is_complete() {
        ReadingFields::default()
    } else {
        state
            .store
            .latest()
            .await?
            .map(|r| ReadingFields::from(&r))
            .unwrap_or_default()
    };

    let features = ingest::resolve_features(explicit.or(stored));
    tracing::debug!("Recommending for {:?}", features);

    let result = stage.recommend(features)?;
    Ok(Json(result))
}
