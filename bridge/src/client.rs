//! HTTP client for the Soil Advisor ingest endpoint.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;

use crate::errors::BridgeError;
use crate::parser::ParsedLine;

/// pH sent until the device carries a pH probe.
pub const PLACEHOLDER_PH: f64 = 7.0;
/// NPK sent until the device carries an NPK probe.
pub const PLACEHOLDER_NPK: f64 = 120.0;

/// Body of one ingest request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestPayload {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: f64,
    pub npk: f64,
}

impl IngestPayload {
    /// Take moisture and temperature from the line; pH and NPK are placeholders.
    pub fn from_parsed(parsed: &ParsedLine) -> Self {
        Self {
            moisture: parsed.get("moisture").copied().flatten(),
            temperature: parsed.get("temperature").copied().flatten(),
            ph: PLACEHOLDER_PH,
            npk: PLACEHOLDER_NPK,
        }
    }
}

/// Client for the ingest endpoint.
#[derive(Debug, Clone)]
pub struct IngestClient {
    client: reqwest::Client,
    url: String,
}

impl IngestClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one reading. Returns the response status; non-2xx is not an error
    /// here, the caller decides how to report it.
    pub async fn forward(&self, payload: &IngestPayload) -> Result<StatusCode, BridgeError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| BridgeError::Unexpected(format!("Failed to encode payload: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_payload_uses_placeholders() {
        let payload = IngestPayload::from_parsed(&parse_line("moisture:45,temperature:24.50"));
        assert_eq!(
            payload,
            IngestPayload {
                moisture: Some(45.0),
                temperature: Some(24.5),
                ph: 7.0,
                npk: 120.0,
            }
        );
    }

    #[test]
    fn test_payload_missing_and_bad_fields_are_null() {
        let payload = IngestPayload::from_parsed(&parse_line("moisture:abc"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"moisture": null, "temperature": null, "ph": 7.0, "npk": 120.0})
        );
    }

    #[tokio::test]
    async fn test_forward_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ingest"))
            .and(body_json(serde_json::json!({
                "moisture": 30.0, "temperature": 21.5, "ph": 7.0, "npk": 120.0
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            IngestClient::new(&format!("{}/api/ingest", server.uri()), Duration::from_secs(5))
                .unwrap();
        let payload = IngestPayload::from_parsed(&parse_line("moisture:30,temperature:21.5"));
        let status = client.forward(&payload).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_forward_returns_rejection_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = IngestClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let payload = IngestPayload::from_parsed(&parse_line("moisture:1"));
        assert_eq!(
            client.forward(&payload).await.unwrap(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_forward_connection_refused_is_transport_error() {
        // Bind then drop a listener to get a port nobody is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = IngestClient::new(
            &format!("http://127.0.0.1:{}/api/ingest", port),
            Duration::from_secs(5),
        )
        .unwrap();
        let payload = IngestPayload::from_parsed(&parse_line("moisture:1"));
        let err = client.forward(&payload).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_forward_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = IngestClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let payload = IngestPayload::from_parsed(&parse_line("moisture:1"));
        let err = client.forward(&payload).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn test_forward_invalid_url_is_unexpected() {
        let client = IngestClient::new("not a url", Duration::from_secs(1)).unwrap();
        let payload = IngestPayload::from_parsed(&parse_line("moisture:1"));
        let err = client.forward(&payload).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unexpected(_)), "got {:?}", err);
    }
}
