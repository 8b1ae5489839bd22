//! Device session lifecycle and command surface.
//!
//! One `DeviceSession` owns at most one live transport. Commands lock the
//! link slot, re-check the phase, and perform their writes under the lock, so
//! multi-part sequences (break + script, paste enter/body/exit) never
//! interleave. The read loop runs as a spawned task that only touches the
//! store and its own transport handle, never the slot, so disconnect can
//! cancel it and then await it without deadlocking.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::reassembler::LineReassembler;
use crate::core::repl;
use crate::core::session::store::{ConnectionPhase, SessionSnapshot, SessionStore};
use crate::core::transport::{ChunkStream, Transport, TransportSummary};
use crate::domain::config::{ConnectOptions, GlobalConfig};
use crate::domain::error::{DeviceError, DeviceResult};
use crate::infrastructure::serial::SerialTransport;
use crate::infrastructure::storage;
use crate::infrastructure::usb::UsbTransport;

struct ActiveLink {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    read_task: Option<JoinHandle<()>>,
}

impl Drop for ActiveLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Single-device session manager.
pub struct DeviceSession {
    store: Arc<SessionStore>,
    link: Mutex<Option<ActiveLink>>,
}

impl DeviceSession {
    pub fn new() -> Self {
        Self::with_capacity(GlobalConfig::default().log_capacity)
    }

    pub fn with_capacity(log_capacity: usize) -> Self {
        Self {
            store: Arc::new(SessionStore::new(log_capacity)),
            link: Mutex::new(None),
        }
    }

    /// Shared handle to the observable session state.
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Open a transport from options and start the session.
    ///
    /// Fails with a connect error if a session is already connecting or
    /// connected; the previous session must be disconnected first.
    pub async fn connect(&self, options: &ConnectOptions) -> DeviceResult<TransportSummary> {
        let mut slot = self.link.lock().await;
        self.ensure_idle(&mut slot).await?;
        self.store.begin_connect().await;

        let opened = match options {
            ConnectOptions::Serial(serial_options) => {
                info!("opening serial port {}", serial_options.port);
                SerialTransport::open(serial_options).await
            }
            ConnectOptions::Usb(usb_options) => {
                info!("opening usb device");
                UsbTransport::open(usb_options).await
            }
        };

        match opened {
            Ok((transport, chunks)) => Ok(self.install(&mut slot, transport, chunks).await),
            Err(err) => {
                error!("connect failed: {}", err);
                self.store.connect_failed(&err).await;
                Err(err)
            }
        }
    }

    /// Start the session over a caller-supplied transport.
    ///
    /// Same contract as [`connect`](Self::connect); this is the seam custom
    /// transports plug into.
    pub async fn connect_with(
        &self,
        transport: Arc<dyn Transport>,
        chunks: ChunkStream,
    ) -> DeviceResult<TransportSummary> {
        let mut slot = self.link.lock().await;
        self.ensure_idle(&mut slot).await?;
        self.store.begin_connect().await;
        Ok(self.install(&mut slot, transport, chunks).await)
    }

    async fn ensure_idle(&self, slot: &mut Option<ActiveLink>) -> DeviceResult<()> {
        if self.store.phase().await != ConnectionPhase::Disconnected {
            return Err(DeviceError::Connect {
                message: "a device session is already active; disconnect first".to_string(),
            });
        }
        // A link left behind by a forced disconnect; its loop is already
        // done, so just reap it.
        if let Some(mut stale) = slot.take() {
            stale.cancel.cancel();
            if let Some(task) = stale.read_task.take() {
                let _ = task.await;
            }
        }
        Ok(())
    }

    async fn install(
        &self,
        slot: &mut Option<ActiveLink>,
        transport: Arc<dyn Transport>,
        chunks: ChunkStream,
    ) -> TransportSummary {
        let summary = transport.summary();
        self.store.connect_succeeded(summary.clone()).await;

        let cancel = CancellationToken::new();
        let read_task = tokio::spawn(run_read_loop(
            Arc::clone(&self.store),
            Arc::clone(&transport),
            chunks,
            cancel.clone(),
        ));

        *slot = Some(ActiveLink {
            transport,
            cancel,
            read_task: Some(read_task),
        });
        info!("connected to {}", summary);
        summary
    }

    /// Tear the session down. Idempotent; close errors are recorded but
    /// never prevent the transition to disconnected.
    pub async fn disconnect(&self) -> DeviceResult<()> {
        let mut slot = self.link.lock().await;
        let Some(mut active) = slot.take() else {
            debug!("disconnect requested with no active link");
            return Ok(());
        };

        let was_connected = self.store.is_connected().await;
        info!("closing {} link", active.transport.kind());
        active.cancel.cancel();
        if was_connected {
            if let Err(err) = active.transport.close().await {
                warn!("transport close failed: {}", err);
                self.store.set_error(&err).await;
            }
        }
        if let Some(task) = active.read_task.take() {
            if task.await.is_err() {
                debug!("read task ended abnormally");
            }
        }
        self.store.set_phase(ConnectionPhase::Disconnected).await;
        Ok(())
    }

    /// Write bytes through the active transport as-is.
    pub async fn send_raw(&self, bytes: &[u8]) -> DeviceResult<()> {
        self.write_sequence(&[bytes]).await
    }

    /// Send a REPL command line; empty input is a no-op.
    pub async fn send_command(&self, command: &str) -> DeviceResult<()> {
        if command.is_empty() {
            debug!("ignoring empty command");
            return Ok(());
        }
        let line = format!("{}{}", command, repl::COMMAND_TERMINATOR);
        self.write_sequence(&[line.as_bytes()]).await
    }

    /// Interrupt the running program and drop into the UF2 bootloader.
    pub async fn trigger_fs_mode(&self) -> DeviceResult<()> {
        info!("requesting bootloader mode");
        self.write_sequence(&[repl::BREAK, repl::BOOTLOADER_SCRIPT.as_bytes()])
            .await
    }

    /// Interrupt the running program, leaving the board at the REPL prompt.
    pub async fn trigger_repl_mode(&self) -> DeviceResult<()> {
        info!("interrupting running program");
        self.write_sequence(&[repl::BREAK]).await
    }

    /// Interrupt the running program and reset the board.
    pub async fn reboot(&self) -> DeviceResult<()> {
        info!("requesting board reset");
        self.write_sequence(&[repl::BREAK, repl::RESET_SCRIPT.as_bytes()])
            .await
    }

    /// Push a text file to the board via paste mode.
    pub async fn upload_file(&self, path: &Path) -> DeviceResult<()> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) => {
                let err = DeviceError::Storage {
                    message: format!("failed to read {}: {}", path.display(), err),
                };
                self.store.set_error(&err).await;
                return Err(err);
            }
        };
        info!(
            "uploading {} ({} bytes) via paste mode",
            path.display(),
            text.len()
        );
        self.write_sequence(&[repl::PASTE_ENTER, text.as_bytes(), repl::PASTE_EXIT])
            .await
    }

    /// Copy a UF2 image into the board's mounted mass-storage directory.
    ///
    /// A filesystem side channel: it never touches the transport and may run
    /// while a session is active. Returns the number of bytes written.
    pub async fn copy_uf2(&self, source: &Path, dest_dir: &Path) -> DeviceResult<u64> {
        match storage::copy_into_dir(source, dest_dir).await {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.store.set_error(&err).await;
                Err(err)
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.store.is_connected().await
    }

    /// Last `n` log lines, oldest first.
    pub async fn log_tail(&self, n: usize) -> Vec<String> {
        self.store.log_tail(n).await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot().await
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.store.subscribe()
    }

    /// Write parts in order under the link lock, re-checking the phase
    /// first. Any failure is recorded as the session's last error.
    async fn write_sequence(&self, parts: &[&[u8]]) -> DeviceResult<()> {
        let slot = self.link.lock().await;
        let connected = self.store.is_connected().await;
        let active = match slot.as_ref() {
            Some(active) if connected => active,
            _ => {
                let err = DeviceError::NotConnected;
                self.store.set_error(&err).await;
                return Err(err);
            }
        };
        for part in parts {
            if let Err(err) = active.transport.write(part).await {
                error!("device write failed: {}", err);
                self.store.set_error(&err).await;
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Background reader: chunks in, log lines out.
async fn run_read_loop(
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    mut chunks: ChunkStream,
    cancel: CancellationToken,
) {
    let mut lines = LineReassembler::new();
    loop {
        // Biased so chunks already queued get processed before a
        // cancellation is honored.
        let next = tokio::select! {
            biased;
            chunk = chunks.next() => chunk,
            _ = cancel.cancelled() => break,
        };
        match next {
            Some(Ok(text)) => {
                let complete = lines.feed(&text);
                if !complete.is_empty() {
                    store.append_lines(complete).await;
                }
            }
            Some(Err(err)) => {
                if cancel.is_cancelled() || err.is_cancellation() {
                    debug!("read ended during teardown: {}", err);
                } else {
                    error!("device read failed: {}", err);
                    store.connection_lost(&err).await;
                    if let Err(close_err) = transport.close().await {
                        warn!("close after read failure: {}", close_err);
                    }
                }
                break;
            }
            None => {
                debug!("device stream ended");
                break;
            }
        }
    }
    if let Some(tail) = lines.flush() {
        store.append_lines(vec![tail]).await;
    }
}
