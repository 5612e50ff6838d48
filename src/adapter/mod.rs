//! The adapter core: state control, outbound buffering, context
//! composition, and the engine that ties them to the transport.

pub mod buffer;
pub mod context;
pub mod engine;
pub mod state;

pub use engine::UspRecoEngineAdapter;
pub use state::{AudioState, ProtocolState};
