pub mod health;
pub mod recommendations;
pub mod sensors;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::db::store::ReadingStore;
use crate::services::inference::InferenceStage;

/// Shared application state, injected into every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: ReadingStore,
    /// `None` when the models failed to load; recommendations are then refused.
    pub(crate) inference: Option<Arc<InferenceStage>>,
}

/// All API routes, without docs or middleware layers.
pub(crate) fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/sensors", get(sensors::get_sensors))
        .route("/api/ingest", post(sensors::ingest_reading))
        .route("/api/readings", get(sensors::list_readings))
        .route("/api/recommendations", post(recommendations::recommend))
        .with_state(state)
}
