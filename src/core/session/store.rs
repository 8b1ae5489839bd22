//! Session state store: the single source of truth observers read.
//!
//! All mutations take the write lock, apply one logical change, and publish a
//! fresh snapshot on the watch channel, so observers never see a torn state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::core::transport::TransportSummary;
use crate::domain::error::{DeviceError, LastError};

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
        }
    }
}

/// Immutable view of the session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub transport: Option<TransportSummary>,
    pub last_error: Option<LastError>,
    pub logs: Vec<String>,
    /// Lines appended since the last successful connect, monotonic even
    /// across eviction; observers use it to render deltas.
    pub lines_total: u64,
}

#[derive(Debug)]
struct StoreState {
    phase: ConnectionPhase,
    transport: Option<TransportSummary>,
    last_error: Option<LastError>,
    logs: VecDeque<String>,
    lines_total: u64,
}

impl StoreState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_connected: self.phase == ConnectionPhase::Connected,
            is_connecting: self.phase == ConnectionPhase::Connecting,
            transport: self.transport.clone(),
            last_error: self.last_error.clone(),
            logs: self.logs.iter().cloned().collect(),
            lines_total: self.lines_total,
        }
    }
}

/// Phase, last error, transport summary, and the rolling log buffer.
pub struct SessionStore {
    capacity: usize,
    state: RwLock<StoreState>,
    notify: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        let (notify, _) = watch::channel(SessionSnapshot::default());
        Self {
            capacity,
            state: RwLock::new(StoreState {
                phase: ConnectionPhase::Disconnected,
                transport: None,
                last_error: None,
                logs: VecDeque::new(),
                lines_total: 0,
            }),
            notify,
        }
    }

    /// Log buffer capacity in lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut StoreState),
    {
        let mut state = self.state.write().await;
        apply(&mut state);
        self.notify.send_replace(state.snapshot());
    }

    pub async fn set_phase(&self, phase: ConnectionPhase) {
        self.mutate(|state| {
            state.phase = phase;
            if phase != ConnectionPhase::Connected {
                state.transport = None;
            }
        })
        .await;
    }

    pub async fn set_error(&self, err: &DeviceError) {
        let record = LastError::from(err);
        self.mutate(|state| state.last_error = Some(record)).await;
    }

    pub async fn clear_error(&self) {
        self.mutate(|state| state.last_error = None).await;
    }

    /// Append complete lines, evicting the oldest once over capacity.
    pub async fn append_lines(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let capacity = self.capacity;
        self.mutate(|state| {
            state.lines_total += lines.len() as u64;
            for line in lines {
                state.logs.push_back(line);
            }
            while state.logs.len() > capacity {
                state.logs.pop_front();
            }
        })
        .await;
    }

    pub async fn clear_logs(&self) {
        self.mutate(|state| {
            state.logs.clear();
            state.lines_total = 0;
        })
        .await;
    }

    /// Phase goes Connecting; logs and error are left alone until the
    /// attempt resolves.
    pub async fn begin_connect(&self) {
        self.mutate(|state| {
            state.phase = ConnectionPhase::Connecting;
            state.transport = None;
        })
        .await;
    }

    /// Attempt succeeded: fresh log buffer, error cleared, phase Connected.
    pub async fn connect_succeeded(&self, summary: TransportSummary) {
        self.mutate(|state| {
            state.phase = ConnectionPhase::Connected;
            state.transport = Some(summary);
            state.last_error = None;
            state.logs.clear();
            state.lines_total = 0;
        })
        .await;
    }

    /// Attempt failed: record the error, back to Disconnected. Previous logs
    /// stay as they were.
    pub async fn connect_failed(&self, err: &DeviceError) {
        let record = LastError::from(err);
        self.mutate(|state| {
            state.phase = ConnectionPhase::Disconnected;
            state.transport = None;
            state.last_error = Some(record);
        })
        .await;
    }

    /// The read loop hit a fatal error: treat it as connection loss.
    pub async fn connection_lost(&self, err: &DeviceError) {
        self.connect_failed(err).await;
    }

    pub async fn phase(&self) -> ConnectionPhase {
        self.state.read().await.phase
    }

    pub async fn is_connected(&self) -> bool {
        self.phase().await == ConnectionPhase::Connected
    }

    pub async fn last_error(&self) -> Option<LastError> {
        self.state.read().await.last_error.clone()
    }

    /// Last `min(n, len)` lines in order; `n = 0` yields nothing.
    pub async fn log_tail(&self, n: usize) -> Vec<String> {
        let state = self.state.read().await;
        let len = state.logs.len();
        let skip = len.saturating_sub(n);
        state.logs.iter().skip(skip).cloned().collect()
    }

    pub async fn log_len(&self) -> usize {
        self.state.read().await.logs.len()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    /// Watch receiver that yields a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_capacity_eviction_is_fifo() {
        let store = SessionStore::new(3);
        store.append_lines(lines(&["a", "b", "c", "d"])).await;

        assert_eq!(store.log_tail(10).await, lines(&["b", "c", "d"]));
        assert_eq!(store.log_len().await, 3);
        assert_eq!(store.snapshot().await.lines_total, 4);
    }

    #[tokio::test]
    async fn test_log_tail_edges() {
        let store = SessionStore::new(10);
        store.append_lines(lines(&["a", "b", "c"])).await;

        assert!(store.log_tail(0).await.is_empty());
        assert_eq!(store.log_tail(2).await, lines(&["b", "c"]));
        assert_eq!(store.log_tail(3).await, lines(&["a", "b", "c"]));
        assert_eq!(store.log_tail(99).await, lines(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_connect_success_resets_logs_and_error() {
        let store = SessionStore::new(10);
        store.append_lines(lines(&["stale"])).await;
        store
            .set_error(&DeviceError::Read {
                message: "old failure".to_string(),
            })
            .await;

        store.begin_connect().await;
        assert_eq!(store.phase().await, ConnectionPhase::Connecting);
        // Logs from the previous session survive until the attempt succeeds.
        assert_eq!(store.log_len().await, 1);

        store
            .connect_succeeded(TransportSummary {
                kind: crate::core::transport::TransportKind::Serial,
                device: "/dev/ttyACM0 @ 115200".to_string(),
            })
            .await;

        let snapshot = store.snapshot().await;
        assert!(snapshot.is_connected);
        assert!(!snapshot.is_connecting);
        assert!(snapshot.last_error.is_none());
        assert!(snapshot.logs.is_empty());
        assert_eq!(snapshot.lines_total, 0);
        assert!(snapshot.transport.is_some());
    }

    #[tokio::test]
    async fn test_connect_failure_preserves_logs() {
        let store = SessionStore::new(10);
        store.append_lines(lines(&["previous output"])).await;

        store.begin_connect().await;
        store
            .connect_failed(&DeviceError::Connect {
                message: "open denied".to_string(),
            })
            .await;

        let snapshot = store.snapshot().await;
        assert!(!snapshot.is_connected);
        assert!(!snapshot.is_connecting);
        assert_eq!(snapshot.logs, lines(&["previous output"]));
        let err = snapshot.last_error.expect("error recorded");
        assert_eq!(err.kind, crate::domain::error::ErrorKind::Connect);
    }

    #[tokio::test]
    async fn test_phase_change_drops_transport_summary() {
        let store = SessionStore::new(10);
        store
            .connect_succeeded(TransportSummary {
                kind: crate::core::transport::TransportKind::Usb,
                device: "2e8a:0005 interface 1".to_string(),
            })
            .await;
        assert!(store.snapshot().await.transport.is_some());

        store.set_phase(ConnectionPhase::Disconnected).await;
        let snapshot = store.snapshot().await;
        assert!(snapshot.transport.is_none());
        assert!(!snapshot.is_connected);
    }

    #[tokio::test]
    async fn test_subscribe_sees_appends() {
        let store = SessionStore::new(10);
        let mut watcher = store.subscribe();

        store.append_lines(lines(&["hello"])).await;
        watcher.changed().await.expect("store alive");
        let snapshot = watcher.borrow_and_update().clone();
        assert_eq!(snapshot.logs, lines(&["hello"]));
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_nothing() {
        let store = SessionStore::new(0);
        store.append_lines(lines(&["a"])).await;
        assert_eq!(store.log_len().await, 0);
        assert_eq!(store.snapshot().await.lines_total, 1);
    }
}
