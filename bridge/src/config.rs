use std::str::FromStr;
use std::time::Duration;

use crate::bridge::BridgeTiming;

/// Bridge configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    /// Full URL of the ingest endpoint.
    pub ingest_url: String,
    /// Wait between failed connection attempts.
    pub reconnect_delay: Duration,
    /// Grace period after opening the port while the device resets.
    pub settle_delay: Duration,
    /// Upper bound on a single line read.
    pub read_timeout: Duration,
    /// Upper bound on a single ingest request.
    pub post_timeout: Duration,
    /// Pause after an unexpected error before reading again.
    pub error_delay: Duration,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self {
            serial_port: std::env::var("SERIAL_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string()),
            baud_rate: env_or("BAUD_RATE", 9600),
            ingest_url: std::env::var("INGEST_URL")
                .unwrap_or_else(|_| "http://localhost:5000/api/ingest".to_string()),
            reconnect_delay: Duration::from_secs(env_or("RECONNECT_DELAY_SECS", 5)),
            settle_delay: Duration::from_secs(env_or("SETTLE_DELAY_SECS", 2)),
            read_timeout: Duration::from_secs(env_or("READ_TIMEOUT_SECS", 2)),
            post_timeout: Duration::from_secs(env_or("POST_TIMEOUT_SECS", 5)),
            error_delay: Duration::from_secs(env_or("ERROR_DELAY_SECS", 2)),
        }
    }

    pub fn timing(&self) -> BridgeTiming {
        BridgeTiming {
            reconnect_delay: self.reconnect_delay,
            settle_delay: self.settle_delay,
            read_timeout: self.read_timeout,
            error_delay: self.error_delay,
        }
    }
}

fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{}='{}' is not valid, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        unsafe {
            for key in [
                "SERIAL_PORT",
                "BAUD_RATE",
                "INGEST_URL",
                "RECONNECT_DELAY_SECS",
                "SETTLE_DELAY_SECS",
                "READ_TIMEOUT_SECS",
                "POST_TIMEOUT_SECS",
                "ERROR_DELAY_SECS",
            ] {
                std::env::remove_var(key);
            }
        }

        let config = BridgeConfig::from_env();

        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.ingest_url, "http://localhost:5000/api/ingest");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.post_timeout, Duration::from_secs(5));
        assert_eq!(config.timing().read_timeout, Duration::from_secs(2));
    }
}
