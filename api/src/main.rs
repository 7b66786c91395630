// Soil Advisor API v0.1
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use db::store::ReadingStore;
use routes::AppState;
use services::inference::InferenceStage;

/// Soil Advisor API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Soil Advisor API",
        version = "0.1.0",
        description = "Ingests soil sensor readings (moisture, temperature, pH, NPK) into a \
            durable reading log and recommends crops with a two-stage model: soil type \
            first, then crop probabilities conditioned on the soil type.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Sensors", description = "Reading ingestion and history"),
        (name = "Recommendations", description = "Crop recommendations"),
    ),
    paths(
        routes::health::health_check,
        routes::sensors::get_sensors,
        routes::sensors::ingest_reading,
        routes::sensors::list_readings,
        routes::recommendations::recommend,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::sensors::ReadingInput,
            routes::sensors::SensorReadingResponse,
            services::composer::RecommendationResult,
            services::composer::CropRecommendation,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soil_advisor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let store = match ReadingStore::open(Path::new(&config.database_path)).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Failed to open reading store at {}: {}",
                config.database_path,
                e
            );
            std::process::exit(1);
        }
    };

    // Models load once; on failure the service keeps ingesting readings but
    // refuses recommendation requests.
    let inference = match InferenceStage::load(Path::new(&config.model_dir)) {
        Ok(stage) => Some(Arc::new(stage)),
        Err(e) => {
            tracing::error!(
                "Failed to load models from {}: {}. Recommendations are disabled.",
                config.model_dir,
                e
            );
            None
        }
    };

    let app_state = AppState { store, inference };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = routes::api_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server terminated unexpectedly: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_all_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/sensors",
            "/api/ingest",
            "/api/readings",
            "/api/recommendations",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_reading_input_documents_numeric_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schema = &doc["components"]["schemas"]["ReadingInput"];
        for field in ["moisture", "temperature", "ph", "npk"] {
            let description = schema["properties"][field]["description"]
                .as_str()
                .unwrap_or_default();
            assert!(
                description.contains("numeric string"),
                "{} description: {:?}",
                field,
                description
            );
        }
        assert_eq!(schema["example"]["temperature"], "24.5");
    }
}
