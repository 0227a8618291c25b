//! WebSocket Voice Relay
//!
//! This module contains the logic for relaying turn-based voice conversations
//! between the browser and the upstream voice model. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: Classifies client frames into audio and control signals.
//! - `relay`: The per-connection turn state machine.
//! - `session`: Upgrades HTTP requests and runs one relay per socket.

pub mod protocol;
pub mod relay;
pub mod session;

pub use session::ws_handler;
