use std::sync::Arc;

use async_trait::async_trait;
use nusb::transfer::{Direction, EndpointType, RequestBuffer, TransferError};
use nusb::{Device, Interface};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::decode::Utf8Decoder;
use crate::core::transport::{ChunkStream, Transport, TransportKind, TransportSummary};
use crate::domain::config::UsbOptions;
use crate::domain::error::{DeviceError, DeviceResult};

/// Packet-oriented USB bulk backend.
///
/// The pump task polls IN transfers of the endpoint's packet size; a stall
/// gets a clear-halt and a retry instead of ending the stream. Writes go out
/// as single bulk OUT transfers.
pub struct UsbTransport {
    interface: Interface,
    endpoint_out: Option<u8>,
    summary: TransportSummary,
    cancel: CancellationToken,
}

struct ResolvedEndpoints {
    interface_number: u8,
    alt_setting: u8,
    endpoint_in: u8,
    endpoint_out: Option<u8>,
    packet_size: usize,
}

impl UsbTransport {
    pub async fn open(options: &UsbOptions) -> DeviceResult<(Arc<dyn Transport>, ChunkStream)> {
        let devices = nusb::list_devices().map_err(|e| DeviceError::Connect {
            message: format!("failed to enumerate USB devices: {}", e),
        })?;
        let info = devices
            .into_iter()
            .find(|d| {
                options.vendor_id.map_or(true, |vid| d.vendor_id() == vid)
                    && options.product_id.map_or(true, |pid| d.product_id() == pid)
            })
            .ok_or_else(|| DeviceError::Connect {
                message: "no matching USB device found".to_string(),
            })?;

        let vendor_id = info.vendor_id();
        let product_id = info.product_id();
        let device = info.open().map_err(|e| DeviceError::Connect {
            message: format!("failed to open {:04x}:{:04x}: {}", vendor_id, product_id, e),
        })?;

        if device.active_configuration().is_err() {
            let first = device
                .configurations()
                .next()
                .map(|c| c.configuration_value())
                .unwrap_or(1);
            info!("no active configuration, selecting {}", first);
            device
                .set_configuration(first)
                .map_err(|e| DeviceError::Connect {
                    message: format!("failed to select configuration: {}", e),
                })?;
        }

        let resolved = resolve_endpoints(&device, options)?;
        let interface =
            device
                .claim_interface(resolved.interface_number)
                .map_err(|e| DeviceError::Connect {
                    message: format!(
                        "failed to claim interface {}: {}",
                        resolved.interface_number, e
                    ),
                })?;
        if resolved.alt_setting != 0 {
            interface
                .set_alt_setting(resolved.alt_setting)
                .map_err(|e| DeviceError::Config {
                    message: format!(
                        "failed to select alternate setting {}: {}",
                        resolved.alt_setting, e
                    ),
                })?;
        }
        info!(
            "claimed usb interface {}, endpoint in 0x{:02x}, endpoint out {:?}, packet size {}",
            resolved.interface_number, resolved.endpoint_in, resolved.endpoint_out,
            resolved.packet_size
        );

        let cancel = CancellationToken::new();
        let (chunk_sender, chunks) = ChunkStream::channel();
        spawn_pump(
            interface.clone(),
            resolved.endpoint_in,
            resolved.packet_size.max(1),
            chunk_sender,
            cancel.clone(),
        );

        let transport = Arc::new(Self {
            interface,
            endpoint_out: resolved.endpoint_out,
            summary: TransportSummary {
                kind: TransportKind::Usb,
                device: format!(
                    "{:04x}:{:04x} interface {}",
                    vendor_id, product_id, resolved.interface_number
                ),
            },
            cancel,
        });
        Ok((transport, chunks))
    }
}

#[async_trait]
impl Transport for UsbTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }

    fn summary(&self) -> TransportSummary {
        self.summary.clone()
    }

    async fn write(&self, bytes: &[u8]) -> DeviceResult<()> {
        let Some(endpoint) = self.endpoint_out else {
            return Err(DeviceError::Config {
                message: "no bulk OUT endpoint resolved for this device".to_string(),
            });
        };
        let completion = self.interface.bulk_out(endpoint, bytes.to_vec()).await;
        completion.into_result().map_err(|e| DeviceError::Write {
            message: format!("usb write failed: {}", e),
        })?;
        debug!("sent {} bytes over usb", bytes.len());
        Ok(())
    }

    async fn close(&self) -> DeviceResult<()> {
        // Cancelling stops the pump; dropping the last interface handle
        // releases the claim.
        self.cancel.cancel();
        info!("usb interface released");
        Ok(())
    }
}

/// Pick the interface and endpoints to use.
///
/// Explicit options win; otherwise scan the active configuration for the
/// first alternate setting with both a bulk IN and a bulk OUT endpoint.
fn resolve_endpoints(device: &Device, options: &UsbOptions) -> DeviceResult<ResolvedEndpoints> {
    if let (Some(interface), Some(endpoint_in)) = (options.interface, options.endpoint_in) {
        return Ok(ResolvedEndpoints {
            interface_number: interface,
            alt_setting: 0,
            endpoint_in,
            endpoint_out: options.endpoint_out,
            packet_size: options.packet_size,
        });
    }

    let config = device
        .active_configuration()
        .map_err(|e| DeviceError::Config {
            message: format!("no active configuration: {}", e),
        })?;

    for group in config.interfaces() {
        for alt in group.alt_settings() {
            let mut bulk_in = None;
            let mut bulk_out = None;
            let mut packet_size = options.packet_size;
            for endpoint in alt.endpoints() {
                if endpoint.transfer_type() != EndpointType::Bulk {
                    continue;
                }
                match endpoint.direction() {
                    Direction::In if bulk_in.is_none() => {
                        bulk_in = Some(endpoint.address());
                        packet_size = endpoint.max_packet_size();
                    }
                    Direction::Out if bulk_out.is_none() => {
                        bulk_out = Some(endpoint.address());
                    }
                    _ => {}
                }
            }
            if let (Some(endpoint_in), Some(endpoint_out)) = (bulk_in, bulk_out) {
                debug!(
                    "resolved interface {} alt {} endpoints 0x{:02x}/0x{:02x}",
                    alt.interface_number(),
                    alt.alternate_setting(),
                    endpoint_in,
                    endpoint_out
                );
                return Ok(ResolvedEndpoints {
                    interface_number: alt.interface_number(),
                    alt_setting: alt.alternate_setting(),
                    endpoint_in,
                    endpoint_out: Some(endpoint_out),
                    packet_size,
                });
            }
        }
    }

    Err(DeviceError::Config {
        message: "no interface exposes both bulk IN and OUT endpoints".to_string(),
    })
}

/// Poll bulk IN transfers and forward decoded text until cancelled or the
/// device goes away.
fn spawn_pump(
    interface: Interface,
    endpoint_in: u8,
    packet_size: usize,
    sender: mpsc::UnboundedSender<DeviceResult<String>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut decoder = Utf8Decoder::new();
        loop {
            let completion = tokio::select! {
                _ = cancel.cancelled() => break,
                completion = interface.bulk_in(endpoint_in, RequestBuffer::new(packet_size)) => {
                    completion
                }
            };
            match completion.into_result() {
                Ok(data) => {
                    if data.is_empty() {
                        continue;
                    }
                    debug!("received {} bytes over usb", data.len());
                    let text = decoder.decode(&data);
                    if !text.is_empty() && sender.send(Ok(text)).is_err() {
                        break;
                    }
                }
                Err(TransferError::Stall) => {
                    debug!("bulk IN endpoint stalled, clearing halt");
                    if let Err(err) = interface.clear_halt(endpoint_in) {
                        if !cancel.is_cancelled() {
                            let _ = sender.send(Err(DeviceError::Read {
                                message: format!("failed to clear stalled endpoint: {}", err),
                            }));
                        }
                        break;
                    }
                }
                Err(TransferError::Cancelled) => break,
                Err(err) => {
                    if !cancel.is_cancelled() {
                        let _ = sender.send(Err(DeviceError::Read {
                            message: format!("usb read failed: {}", err),
                        }));
                    }
                    break;
                }
            }
        }

        if let Some(tail) = decoder.flush() {
            let _ = sender.send(Ok(tail));
        }
        debug!("usb pump stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_fails_without_matching_device() {
        // 0000:0001 is not a real vendor/product pair; either enumeration is
        // unavailable or nothing matches, and both are connect errors.
        let options = UsbOptions {
            vendor_id: Some(0x0000),
            product_id: Some(0x0001),
            ..UsbOptions::default()
        };
        let result = UsbTransport::open(&options).await;
        assert!(result.is_err());
    }
}
