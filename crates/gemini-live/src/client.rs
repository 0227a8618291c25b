//! Upstream session client for the Gemini Live API.

use crate::types::{ClientMessage, ServerMessage};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::{ExposeSecret, SecretString};
use std::{collections::VecDeque, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self,
        protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};
use voice_relay_core::{LiveClient, LiveSession, OutputEvent, OutputStream, UpstreamError};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Default upper bound on connecting plus the wait for `setupComplete`.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one Gemini Live session per turn. Stateless apart from credentials,
/// so a single instance is shared by every connection.
pub struct GeminiLiveClient {
    api_key: SecretString,
    model: String,
    endpoint: String,
    open_timeout: Duration,
}

impl GeminiLiveClient {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            open_timeout: OPEN_TIMEOUT,
        }
    }

    /// Points the client at a different `BidiGenerateContent` endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Bounds the whole handshake, from TCP connect to `setupComplete`.
    pub fn with_open_timeout(mut self, limit: Duration) -> Self {
        self.open_timeout = limit;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}key={}",
            self.endpoint,
            separator,
            self.api_key.expose_secret()
        )
    }
}

#[async_trait]
impl LiveClient for GeminiLiveClient {
    async fn open(&self, instruction: &str) -> Result<Box<dyn LiveSession>, UpstreamError> {
        let handshake = async {
            let (ws_stream, _) = connect_async(self.url())
                .await
                .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
            let (mut tx, mut rx) = ws_stream.split();

            send_json(&mut tx, &ClientMessage::setup(&self.model, instruction))
                .await
                .map_err(UpstreamError::Unavailable)?;
            await_setup_complete(&mut rx).await?;
            Ok::<_, UpstreamError>((tx, rx))
        };

        let (tx, rx) = tokio::time::timeout(self.open_timeout, handshake)
            .await
            .map_err(|_| {
                UpstreamError::Unavailable(format!(
                    "timed out after {:?} opening Gemini Live session",
                    self.open_timeout
                ))
            })??;

        info!(model = %self.model, "Gemini Live session ready.");
        Ok(Box::new(GeminiLiveSession {
            tx,
            rx,
            input_ended: false,
            closed: false,
        }))
    }
}

/// A single Gemini Live exchange, owned by the turn that opened it.
pub struct GeminiLiveSession {
    tx: SplitSink<WsStream, WsMessage>,
    rx: SplitStream<WsStream>,
    input_ended: bool,
    closed: bool,
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_audio(&mut self, chunk: Bytes) -> Result<(), UpstreamError> {
        if self.closed || self.input_ended {
            return Err(UpstreamError::Send("session input has already ended".to_string()));
        }
        send_json(&mut self.tx, &ClientMessage::audio(&chunk))
            .await
            .map_err(UpstreamError::Send)
    }

    async fn end_input(&mut self) -> Result<(), UpstreamError> {
        if self.closed || self.input_ended {
            return Err(UpstreamError::Send("session input has already ended".to_string()));
        }
        self.input_ended = true;
        send_json(&mut self.tx, &ClientMessage::audio_stream_end())
            .await
            .map_err(UpstreamError::Send)
    }

    fn receive(&mut self) -> OutputStream<'_> {
        let state = ReceiveState {
            rx: &mut self.rx,
            pending: VecDeque::new(),
            done: self.closed,
        };
        Box::pin(futures_util::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(event) = st.pending.pop_front() {
                    if event == OutputEvent::TurnComplete {
                        st.done = true;
                        st.pending.clear();
                    }
                    return Some((Ok(event), st));
                }
                if st.done {
                    return None;
                }
                let msg = match st.rx.next().await {
                    None => return None,
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(UpstreamError::Stream(e.to_string())), st));
                    }
                    Some(Ok(msg)) => msg,
                };
                match msg {
                    WsMessage::Text(text) => {
                        if let Err(e) = st.absorb(text.as_bytes()) {
                            st.done = true;
                            return Some((Err(e), st));
                        }
                    }
                    WsMessage::Binary(data) => {
                        if let Err(e) = st.absorb(&data) {
                            st.done = true;
                            return Some((Err(e), st));
                        }
                    }
                    WsMessage::Close(frame) => {
                        st.done = true;
                        if !is_normal_close(frame.as_ref()) {
                            return Some((
                                Err(UpstreamError::Stream(format!(
                                    "session closed by server: {}",
                                    describe_close(frame.as_ref())
                                ))),
                                st,
                            ));
                        }
                        return None;
                    }
                    _ => {}
                }
            }
        }))
    }

    async fn close(&mut self) -> Result<(), UpstreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.tx.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(UpstreamError::Send(e.to_string())),
        }
    }
}

struct ReceiveState<'a> {
    rx: &'a mut SplitStream<WsStream>,
    pending: VecDeque<OutputEvent>,
    done: bool,
}

impl ReceiveState<'_> {
    fn absorb(&mut self, payload: &[u8]) -> Result<(), UpstreamError> {
        let Some(msg) = parse_server_message(payload) else {
            return Ok(());
        };
        if msg.go_away.is_some() {
            warn!("Gemini Live announced it will close the session soon.");
        }
        self.pending.extend(msg.into_output_events()?);
        Ok(())
    }
}

async fn send_json(
    tx: &mut SplitSink<WsStream, WsMessage>,
    msg: &ClientMessage,
) -> Result<(), String> {
    let payload = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    tx.send(WsMessage::Text(payload.into()))
        .await
        .map_err(|e| e.to_string())
}

async fn await_setup_complete(rx: &mut SplitStream<WsStream>) -> Result<(), UpstreamError> {
    while let Some(msg) = rx.next().await {
        let msg = msg.map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        let parsed = match &msg {
            WsMessage::Text(text) => parse_server_message(text.as_bytes()),
            WsMessage::Binary(data) => parse_server_message(data),
            WsMessage::Close(frame) => {
                return Err(UpstreamError::Unavailable(format!(
                    "session closed during setup: {}",
                    describe_close(frame.as_ref())
                )));
            }
            _ => None,
        };
        if parsed.is_some_and(|m| m.setup_complete.is_some()) {
            return Ok(());
        }
    }
    Err(UpstreamError::Unavailable(
        "connection ended before setup completed".to_string(),
    ))
}

fn parse_server_message(payload: &[u8]) -> Option<ServerMessage> {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!(error = %e, "Skipping unrecognized Gemini Live message.");
            None
        }
    }
}

fn is_normal_close(frame: Option<&CloseFrame>) -> bool {
    frame.is_none_or(|f| f.code == CloseCode::Normal)
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(f) => format!("{} {}", u16::from(f.code), f.reason.as_str()),
        None => "no close frame".to_string(),
    }
}
