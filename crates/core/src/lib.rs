//! Provider-agnostic building blocks for the turn-based voice relay.
//!
//! The relay itself lives in the API service; this crate holds the pieces it
//! drives for each connection: the per-turn audio buffer, the personalization
//! context used to derive system instructions, and the interface any
//! streaming voice-model backend must implement.

pub mod persona;
pub mod realtime_api;
pub mod turn;

pub use persona::Personalization;
pub use realtime_api::{LiveClient, LiveSession, OutputEvent, OutputStream, UpstreamError};
pub use turn::{TurnBuffer, TurnOutcome};
