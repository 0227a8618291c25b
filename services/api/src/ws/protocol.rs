//! Defines the WebSocket framing between the browser client and the relay.
//!
//! Audio travels in binary frames and is never inspected. Control signals
//! travel in text frames; the two are told apart by frame type alone.

use axum::extract::ws::Message;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

/// Text frame that closes the listening phase of a turn.
pub const END_TURN: &str = "END_TURN";
/// End-of-turn token sent by older clients.
pub const LEGACY_END_TURN: &str = "AUDIO_STREAM_END";

/// A client frame the relay acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// One opaque PCM16 mono 16 kHz audio chunk.
    Audio(Bytes),
    Control(ClientControl),
}

/// A raw WebSocket message from the client, classified.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Frame(ClientFrame),
    /// A message with nothing for the relay to act on.
    Ignored,
    /// The client sent a close frame.
    Close,
}

/// Control signals understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientControl {
    EndTurn,
    Config { user_name: String },
}

/// JSON control messages. Unknown `type` values fail to parse and are ignored.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum JsonControl {
    #[serde(rename = "config")]
    Config {
        #[serde(rename = "userName")]
        user_name: String,
    },
}

/// Signals sent from the relay to the client at turn boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSignal {
    /// The turn's response was forwarded in full.
    ResponseComplete,
    /// The turn failed; the relay is already listening again.
    Error,
}

impl ServerSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerSignal::ResponseComplete => "RESPONSE_COMPLETE",
            ServerSignal::Error => "ERROR",
        }
    }

    pub fn into_message(self) -> Message {
        Message::Text(self.as_str().into())
    }
}

impl Inbound {
    pub fn classify(msg: Message) -> Self {
        match msg {
            Message::Binary(data) if data.is_empty() => Inbound::Ignored,
            Message::Binary(data) => Inbound::Frame(ClientFrame::Audio(data)),
            Message::Text(text) => match parse_control(text.as_str()) {
                Some(control) => Inbound::Frame(ClientFrame::Control(control)),
                None => Inbound::Ignored,
            },
            Message::Close(_) => Inbound::Close,
            Message::Ping(_) | Message::Pong(_) => Inbound::Ignored,
        }
    }
}

/// Parses a text frame into a control signal.
///
/// Malformed or unrecognized text is not an error: it yields `None` so that
/// newer clients can send messages this relay does not know yet.
pub fn parse_control(text: &str) -> Option<ClientControl> {
    let trimmed = text.trim();
    if trimmed == END_TURN || trimmed == LEGACY_END_TURN {
        return Some(ClientControl::EndTurn);
    }
    match serde_json::from_str::<JsonControl>(trimmed) {
        Ok(JsonControl::Config { user_name }) => Some(ClientControl::Config { user_name }),
        Err(e) => {
            debug!(error = %e, "Ignoring unrecognized control message.");
            None
        }
    }
}
