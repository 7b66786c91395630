//! Serial-to-HTTP bridge loop.
//!
//! States:
//! - `Disconnected` → `Connecting`: open the port, retrying forever with a
//!   fixed backoff.
//! - `Connecting` → `Connected`: port opened, device settle delay elapsed.
//! - `Reading` ⇄ `Forwarding`: one line at a time, one request at a time.
//! - any I/O failure while reading → `Disconnected` → `Connecting`.
//!
//! Forwarding failures never stop the loop. A reading that cannot be
//! delivered is logged and dropped; it is not retried or buffered.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::client::{IngestClient, IngestPayload};
use crate::errors::BridgeError;
use crate::parser::{decode_line, parse_line};
use crate::serial::Connector;

/// Longest line kept while waiting for a terminator. Anything longer is
/// discarded as line noise.
pub const MAX_LINE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    Reading,
    Forwarding,
}

#[derive(Debug, Clone, Copy)]
pub struct BridgeTiming {
    pub reconnect_delay: Duration,
    pub settle_delay: Duration,
    pub read_timeout: Duration,
    pub error_delay: Duration,
}

/// Counters for what happened to each line, exposed for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub connections: u64,
    pub lines: u64,
    pub forwarded: u64,
    /// Delivered but answered with a non-success status.
    pub rejected: u64,
    /// Lost to a network failure.
    pub dropped: u64,
    pub errors: u64,
}

pub struct Bridge<C: Connector> {
    connector: C,
    client: IngestClient,
    timing: BridgeTiming,
    state: BridgeState,
    stats: BridgeStats,
}

impl<C: Connector> Bridge<C> {
    pub fn new(connector: C, client: IngestClient, timing: BridgeTiming) -> Self {
        Self {
            connector,
            client,
            timing,
            state: BridgeState::Disconnected,
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Run until the process is terminated.
    pub async fn run(&mut self) -> ! {
        tracing::info!(
            "Serial bridge started: {} -> {}",
            self.connector.describe(),
            self.client.url()
        );
        loop {
            let stream = self.connect().await;
            let err = self.run_session(stream).await;
            tracing::warn!("Serial connection lost ({}). Attempting to reconnect...", err);
            let stats = self.stats();
            tracing::info!(
                "Totals after {} connections: {} lines, {} forwarded, {} rejected, {} dropped, {} errors",
                stats.connections,
                stats.lines,
                stats.forwarded,
                stats.rejected,
                stats.dropped,
                stats.errors
            );
        }
    }

    /// Open the serial link, retrying with a fixed backoff until it succeeds.
    pub async fn connect(&mut self) -> C::Stream {
        loop {
            self.transition(BridgeState::Connecting);
            tracing::info!("Trying to connect to {}...", self.connector.describe());
            match self.connector.open().await {
                Ok(stream) => {
                    // Opening the port resets most boards.
                    tokio::time::sleep(self.timing.settle_delay).await;
                    self.stats.connections += 1;
                    self.transition(BridgeState::Connected);
                    tracing::info!("Connected to {}", self.connector.describe());
                    return stream;
                }
                Err(e) => {
                    tracing::error!("Could not open {}: {}", self.connector.describe(), e);
                    tracing::info!(
                        "Retrying in {} seconds...",
                        self.timing.reconnect_delay.as_secs()
                    );
                    tokio::time::sleep(self.timing.reconnect_delay).await;
                }
            }
        }
    }

    /// Read and forward lines until the link fails. Returns the failure.
    pub async fn run_session(&mut self, stream: C::Stream) -> BridgeError {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            self.transition(BridgeState::Reading);
            let line = match self.read_line(&mut reader, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    self.transition(BridgeState::Disconnected);
                    return e;
                }
            };

            self.transition(BridgeState::Forwarding);
            if let Err(e) = self.handle_line(&line).await {
                self.stats.errors += 1;
                tracing::error!("Unexpected error handling '{}': {}", line, e);
                tokio::time::sleep(self.timing.error_delay).await;
            }
        }
    }

    /// Read one non-blank line. `Ok(None)` means the read timed out or the
    /// line was blank or oversized. Bytes of a line cut off by the timeout
    /// stay in `buf` and are completed on the next call, up to
    /// `MAX_LINE_BYTES`.
    async fn read_line<R: AsyncBufRead + Unpin>(
        &self,
        reader: &mut R,
        buf: &mut Vec<u8>,
    ) -> Result<Option<String>, BridgeError> {
        let complete =
            match tokio::time::timeout(self.timing.read_timeout, reader.read_until(b'\n', buf))
                .await
            {
                Err(_) => false,
                Ok(Err(e)) => return Err(BridgeError::Device(e.to_string())),
                Ok(Ok(0)) if buf.is_empty() => {
                    return Err(BridgeError::Device("serial stream closed".to_string()))
                }
                Ok(Ok(_)) => true,
            };

        if buf.len() > MAX_LINE_BYTES {
            tracing::warn!(
                "Discarding {} bytes received without a line break (limit {})",
                buf.len(),
                MAX_LINE_BYTES
            );
            buf.clear();
            return Ok(None);
        }
        if !complete {
            return Ok(None);
        }

        let line = decode_line(buf);
        buf.clear();
        let line = line.trim();
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }

    /// Parse a line and forward it. Network failures are absorbed here;
    /// only unexpected errors are returned.
    async fn handle_line(&mut self, line: &str) -> Result<(), BridgeError> {
        self.stats.lines += 1;
        tracing::debug!("RAW > {}", line);

        let payload = IngestPayload::from_parsed(&parse_line(line));
        match self.client.forward(&payload).await {
            Ok(status) if status.is_success() => {
                self.stats.forwarded += 1;
                tracing::info!("Sent {:?} | server response: {}", payload, status);
            }
            Ok(status) => {
                self.stats.rejected += 1;
                tracing::warn!("Sent {:?} | server rejected reading: {}", payload, status);
            }
            Err(BridgeError::Transport(e)) => {
                self.stats.dropped += 1;
                tracing::warn!("Error sending data to backend, reading dropped: {}", e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn transition(&mut self, next: BridgeState) {
        if self.state != next {
            tracing::debug!("Bridge state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
