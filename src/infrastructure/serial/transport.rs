use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::decode::Utf8Decoder;
use crate::core::transport::{ChunkStream, Transport, TransportKind, TransportSummary};
use crate::domain::config::{FlowControlOption, ParityOption, SerialOptions};
use crate::domain::error::{DeviceError, DeviceResult};

/// Stream-oriented serial backend.
///
/// Reads run on a pump task polling the port with a 100 ms timeout; decoded
/// text is forwarded through the chunk stream. Writes go straight to the
/// port under its lock so the caller sees failures.
pub struct SerialTransport {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    summary: TransportSummary,
    cancel: CancellationToken,
}

impl SerialTransport {
    pub async fn open(options: &SerialOptions) -> DeviceResult<(Arc<dyn Transport>, ChunkStream)> {
        let mut builder = serialport::new(&options.port, options.baud_rate);

        builder = builder.data_bits(match options.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(DeviceError::Config {
                    message: format!("invalid data bits: {}", other),
                })
            }
        });

        builder = builder.stop_bits(match options.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(DeviceError::Config {
                    message: format!("invalid stop bits: {}", other),
                })
            }
        });

        builder = builder.parity(match options.parity {
            ParityOption::None => serialport::Parity::None,
            ParityOption::Odd => serialport::Parity::Odd,
            ParityOption::Even => serialport::Parity::Even,
        });

        builder = builder.flow_control(match options.flow_control {
            FlowControlOption::None => serialport::FlowControl::None,
            FlowControlOption::Software => serialport::FlowControl::Software,
            FlowControlOption::Hardware => serialport::FlowControl::Hardware,
        });

        builder = builder.timeout(Duration::from_millis(100));

        let port = builder.open().map_err(|e| DeviceError::Connect {
            message: format!("failed to open {}: {}", options.port, e),
        })?;
        info!("serial port {} opened at {} baud", options.port, options.baud_rate);

        let port = Arc::new(Mutex::new(port));
        let cancel = CancellationToken::new();
        let (chunk_sender, chunks) = ChunkStream::channel();
        spawn_pump(Arc::clone(&port), chunk_sender, cancel.clone());

        let transport = Arc::new(Self {
            port,
            summary: TransportSummary {
                kind: TransportKind::Serial,
                device: format!("{} @ {}", options.port, options.baud_rate),
            },
            cancel,
        });
        Ok((transport, chunks))
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn summary(&self) -> TransportSummary {
        self.summary.clone()
    }

    async fn write(&self, bytes: &[u8]) -> DeviceResult<()> {
        let mut port = self.port.lock().await;
        port.write_all(bytes).map_err(|e| DeviceError::Write {
            message: format!("serial write failed: {}", e),
        })?;
        debug!("sent {} bytes over serial", bytes.len());
        Ok(())
    }

    async fn close(&self) -> DeviceResult<()> {
        self.cancel.cancel();
        let mut port = self.port.lock().await;
        if let Err(err) = port.flush() {
            debug!("serial flush on close: {}", err);
        }
        info!("serial port closed");
        Ok(())
    }
}

/// Poll the port and forward decoded text until cancelled or the port dies.
fn spawn_pump(
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    sender: mpsc::UnboundedSender<DeviceResult<String>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; 1024];
        let mut decoder = Utf8Decoder::new();

        loop {
            if cancel.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;

            let mut port = port.lock().await;
            match port.read(&mut buffer) {
                Ok(0) => continue,
                Ok(n) => {
                    debug!("received {} bytes over serial", n);
                    let text = decoder.decode(&buffer[..n]);
                    if !text.is_empty() && sender.send(Ok(text)).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    if !cancel.is_cancelled() {
                        let _ = sender.send(Err(DeviceError::Read {
                            message: format!("serial read failed: {}", e),
                        }));
                    }
                    break;
                }
            }
        }

        if let Some(tail) = decoder.flush() {
            let _ = sender.send(Ok(tail));
        }
        debug!("serial pump stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_fails_on_invalid_port() {
        // /dev/null is not a serial port; opening must fail cleanly.
        let options = SerialOptions::new("/dev/null");
        let result = SerialTransport::open(&options).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_line_settings_are_config_errors() {
        let mut options = SerialOptions::new("/dev/null");
        options.data_bits = 9;
        let err = SerialTransport::open(&options).await.unwrap_err();
        assert!(matches!(err, DeviceError::Config { .. }));

        let mut options = SerialOptions::new("/dev/null");
        options.stop_bits = 3;
        let err = SerialTransport::open(&options).await.unwrap_err();
        assert!(matches!(err, DeviceError::Config { .. }));
    }
}
