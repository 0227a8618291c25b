//! Gemini Live implementation of the relay's upstream session client.
//!
//! Each turn opens a fresh `BidiGenerateContent` WebSocket session configured
//! for audio responses, streams the buffered PCM input, signals the end of the
//! audio stream, and yields the model's audio until `turnComplete`.

pub mod client;
pub mod types;

pub use client::{DEFAULT_ENDPOINT, DEFAULT_MODEL, GeminiLiveClient, GeminiLiveSession};
