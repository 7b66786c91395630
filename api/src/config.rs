use std::str::FromStr;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file holding the reading log.
    pub database_path: String,
    /// Directory containing the soil/crop model artifacts and the soil encoder.
    pub model_dir: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/readings.db".to_string()),
            model_dir: std::env::var("MODEL_DIR").unwrap_or_else(|_| "./model".to_string()),
            port: env_or("PORT", 5000),
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or unparseable.
fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{}='{}' is not valid, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
