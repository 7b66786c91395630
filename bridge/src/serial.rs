//! Serial link abstraction.
//!
//! The bridge only needs "open something that yields bytes". Production opens
//! a `tokio-serial` port; tests hand in scripted streams.

use tokio::io::AsyncRead;
use tokio_serial::SerialStream;

use crate::errors::BridgeError;

pub trait Connector {
    type Stream: AsyncRead + Unpin + Send;

    /// Human-readable address for logs.
    fn describe(&self) -> String;

    async fn open(&mut self) -> Result<Self::Stream, BridgeError>;
}

/// Opens a serial port at a fixed path and baud rate.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
        }
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn describe(&self) -> String {
        format!("{} at {} baud", self.port, self.baud_rate)
    }

    async fn open(&mut self) -> Result<SerialStream, BridgeError> {
        let builder = tokio_serial::new(self.port.as_str(), self.baud_rate);
        Ok(SerialStream::open(&builder)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let c = SerialConnector::new("/dev/ttyACM0", 115200);
        assert_eq!(c.describe(), "/dev/ttyACM0 at 115200 baud");
    }

    #[tokio::test]
    async fn test_open_missing_port_is_device_error() {
        let mut c = SerialConnector::new("/dev/does-not-exist-soil-bridge", 9600);
        let err = c.open().await.unwrap_err();
        assert!(matches!(err, BridgeError::Device(_)));
    }
}
