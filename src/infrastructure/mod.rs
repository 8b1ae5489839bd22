pub mod config;
pub mod logging;
pub mod serial;
pub mod storage;
pub mod usb;

pub use config::ConfigManager;
pub use serial::SerialTransport;
pub use usb::UsbTransport;
