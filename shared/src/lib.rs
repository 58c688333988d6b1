//! # Head Soccer Shared
//!
//! Everything the server and the client must agree on bit for bit.
//!
//! - [`constants`]: field geometry, movement tuning and tick cadence
//! - [`physics`]: the deterministic fixed-step simulation
//! - [`snapshot`]: the compact state record sent over the wire
//! - [`protocol`]: JSON messages exchanged over the WebSocket
//!
//! The server runs [`physics::step`] for the whole match. The client runs the
//! reduced step ([`physics::apply_input`] then [`physics::integrate_player`])
//! for its own player only, so predictions match the server exactly when no
//! collisions are involved.

pub mod constants;
pub mod physics;
pub mod protocol;
pub mod snapshot;

pub use physics::{GameState, Keys, StepOutcome};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use snapshot::{deserialize, serialize, WireState};

/// One captured input, tagged with its client-side sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame {
    pub seq: u32,
    pub keys: Keys,
}
