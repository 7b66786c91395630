/// Failures the bridge recovers from. None of them end the process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Serial link failure; the bridge reconnects.
    #[error("Device error: {0}")]
    Device(String),

    /// Ingest request failed on the network; the reading is dropped.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Anything else while handling a line; logged, then reading resumes
    /// after a short delay.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<tokio_serial::Error> for BridgeError {
    fn from(err: tokio_serial::Error) -> Self {
        BridgeError::Device(err.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        // A request that could not even be built is a configuration problem,
        // not a lost packet.
        if err.is_builder() {
            BridgeError::Unexpected(err.to_string())
        } else {
            BridgeError::Transport(err.to_string())
        }
    }
}
