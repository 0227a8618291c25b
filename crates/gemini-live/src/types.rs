//! Wire types for the Gemini Live `BidiGenerateContent` WebSocket API.
//!
//! Only the subset the relay needs is modeled; unknown fields are ignored on
//! the way in.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use voice_relay_core::{OutputEvent, UpstreamError};

/// MIME type of the audio the browser client records.
pub const INPUT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
}

#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
}

#[derive(Serialize, Debug)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<LiveServerContent>,
    pub go_away: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerContent {
    pub model_turn: Option<ServerContentTurn>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct ServerContentTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub inline_data: Option<ServerBlob>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlob {
    pub data: String,
}

impl ClientMessage {
    /// The opening message of a session.
    pub fn setup(model: &str, instruction: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        ClientMessage::Setup(BidiGenerateContentSetup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
            },
            system_instruction: Some(Content {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            }),
        })
    }

    pub fn audio(chunk: &[u8]) -> Self {
        ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Some(Blob {
                mime_type: INPUT_AUDIO_MIME_TYPE.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(chunk),
            }),
            ..Default::default()
        })
    }

    pub fn audio_stream_end() -> Self {
        ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio_stream_end: Some(true),
            ..Default::default()
        })
    }
}

impl ServerMessage {
    /// Output events carried by this message, in part order.
    ///
    /// The turn-complete marker, if present, is always last.
    pub fn into_output_events(self) -> Result<Vec<OutputEvent>, UpstreamError> {
        let mut events = Vec::new();
        let Some(content) = self.server_content else {
            return Ok(events);
        };
        if content.interrupted == Some(true) {
            debug!("Upstream reported the model turn as interrupted.");
        }
        if let Some(turn) = content.model_turn {
            for blob in turn.parts.into_iter().filter_map(|p| p.inline_data) {
                let pcm = base64::engine::general_purpose::STANDARD
                    .decode(blob.data.as_bytes())
                    .map_err(|e| UpstreamError::Stream(format!("invalid audio payload: {e}")))?;
                if !pcm.is_empty() {
                    events.push(OutputEvent::Audio(Bytes::from(pcm)));
                }
            }
        }
        if content.turn_complete == Some(true) {
            events.push(OutputEvent::TurnComplete);
        }
        Ok(events)
    }
}
