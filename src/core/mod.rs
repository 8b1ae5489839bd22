// Core module - Transport abstraction, line reassembly, session management
pub mod decode;
pub mod reassembler;
pub mod repl;
pub mod session;
pub mod transport;

pub use reassembler::LineReassembler;
pub use session::{ConnectionPhase, DeviceSession, SessionSnapshot, SessionStore};
pub use transport::{ChunkStream, Transport, TransportKind, TransportSummary};
