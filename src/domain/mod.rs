// Domain module - Configuration and error types

pub mod config;
pub mod error;

pub use config::{
    BoardlinkConfig, ConnectOptions, DeviceProfile, FlowControlOption, GlobalConfig, ParityOption,
    SerialOptions, UsbOptions,
};
pub use error::{DeviceError, DeviceResult, ErrorKind, LastError};
