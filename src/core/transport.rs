//! Transport abstraction over the serial and USB backends.
//!
//! A backend's `open` hands back two halves: an [`Arc<dyn Transport>`] for
//! writes and teardown, and a [`ChunkStream`] of decoded text the backend's
//! pump task feeds. The session manager owns both; nothing else touches the
//! device.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::error::DeviceResult;

/// Transport backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Serial,
    Usb,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Usb => write!(f, "usb"),
        }
    }
}

/// Status summary of an open transport, safe to hand to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSummary {
    pub kind: TransportKind,
    /// Human-readable device label, e.g. `/dev/ttyACM0 @ 115200` or
    /// `2e8a:0005 interface 1`.
    pub device: String,
}

impl std::fmt::Display for TransportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.device)
    }
}

/// An open channel to the board.
///
/// Implementations forward decoded reads through the [`ChunkStream`] returned
/// alongside them; `write` and `close` are the only inbound calls. `close` is
/// best-effort: implementations log secondary failures and report the first
/// error without leaving the device half-claimed.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn summary(&self) -> TransportSummary;

    async fn write(&self, bytes: &[u8]) -> DeviceResult<()>;

    async fn close(&self) -> DeviceResult<()>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transport({})", self.summary())
    }
}

/// Decoded text chunks read from a transport.
///
/// The stream ends (returns `None`) when the backend pump stops: device
/// disconnect, fatal read error (reported as a final `Err` item), or
/// cancellation.
#[derive(Debug)]
pub struct ChunkStream {
    receiver: mpsc::UnboundedReceiver<DeviceResult<String>>,
}

impl ChunkStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<DeviceResult<String>>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender/stream pair.
    pub fn channel() -> (mpsc::UnboundedSender<DeviceResult<String>>, ChunkStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, ChunkStream::new(receiver))
    }

    pub async fn next(&mut self) -> Option<DeviceResult<String>> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DeviceError;

    #[test]
    fn test_kind_display() {
        assert_eq!(TransportKind::Serial.to_string(), "serial");
        assert_eq!(TransportKind::Usb.to_string(), "usb");
    }

    #[test]
    fn test_summary_display() {
        let summary = TransportSummary {
            kind: TransportKind::Serial,
            device: "/dev/ttyACM0 @ 115200".to_string(),
        };
        assert_eq!(summary.to_string(), "serial /dev/ttyACM0 @ 115200");
    }

    #[tokio::test]
    async fn test_chunk_stream_delivers_in_order() {
        let (sender, mut chunks) = ChunkStream::channel();
        sender.send(Ok("first".to_string())).unwrap();
        sender
            .send(Err(DeviceError::Read {
                message: "gone".to_string(),
            }))
            .unwrap();
        drop(sender);

        assert_eq!(chunks.next().await.unwrap().unwrap(), "first");
        assert!(chunks.next().await.unwrap().is_err());
        assert!(chunks.next().await.is_none());
    }
}
