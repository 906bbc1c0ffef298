//! Streaming session management.
//!
//! This module owns the real concurrency in the server: the bounded audio
//! hand-off channel, the blocking recognition worker and its bridge back to
//! the async side, the per-connection session state machine, and the registry
//! that maps connection identities to sessions.

pub mod channel;

mod bridge;
mod registry;
mod streaming;

pub use bridge::{BridgeEvent, RecognitionBridge};
pub use channel::BackpressurePolicy;
pub use registry::{ConnectionId, SessionRegistry};
pub use streaming::{SessionId, SessionState, StreamingSession};
