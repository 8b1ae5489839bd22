// Session module - Device session lifecycle and observable state
pub mod manager;
pub mod store;

pub use manager::DeviceSession;
pub use store::{ConnectionPhase, SessionSnapshot, SessionStore};
