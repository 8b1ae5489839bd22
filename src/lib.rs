//! Boardlink Library
//!
//! Drives MicroPython-style microcontroller boards over serial or raw USB:
//! REPL commands, bootloader and reset triggers, paste-mode uploads, a rolling
//! log of device output, and UF2 copies onto a mounted bootloader drive.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::session::{ConnectionPhase, DeviceSession, SessionSnapshot, SessionStore};
pub use crate::core::transport::{ChunkStream, Transport, TransportKind, TransportSummary};
pub use crate::domain::config::{BoardlinkConfig, ConnectOptions, SerialOptions, UsbOptions};
pub use crate::domain::error::{DeviceError, DeviceResult, ErrorKind, LastError};
