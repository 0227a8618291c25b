use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Failures talking to the upstream voice-model service.
///
/// All of these are recoverable at the turn boundary; none of them should
/// tear down the client connection.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("failed to send to upstream session: {0}")]
    Send(String),
    #[error("upstream stream failed: {0}")]
    Stream(String),
}

/// An event produced by an upstream session while it answers a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Synthesized PCM audio, forwarded to the client verbatim.
    Audio(Bytes),
    /// The model has finished answering the current turn.
    TurnComplete,
}

/// The output of one upstream session. Finite per turn and not restartable.
pub type OutputStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OutputEvent, UpstreamError>> + Send + 'a>>;

/// Factory for upstream sessions, shared across all connections.
#[async_trait]
pub trait LiveClient: Send + Sync {
    /// Opens one streaming exchange configured with the given system instruction.
    async fn open(&self, instruction: &str) -> Result<Box<dyn LiveSession>, UpstreamError>;
}

/// One streaming exchange with the voice-model service, scoped to a single turn.
///
/// Callers submit all audio, call [`LiveSession::end_input`] once, consume
/// [`LiveSession::receive`], and finally call [`LiveSession::close`] exactly
/// once regardless of how the turn ended.
#[async_trait]
pub trait LiveSession: Send {
    /// Submits one audio chunk for processing.
    async fn send_audio(&mut self, chunk: Bytes) -> Result<(), UpstreamError>;

    /// Signals that no more audio will be sent for this turn.
    async fn end_input(&mut self) -> Result<(), UpstreamError>;

    /// Lazily yields output events until turn completion or session end.
    fn receive(&mut self) -> OutputStream<'_>;

    /// Releases the session. Safe to call after any outcome.
    async fn close(&mut self) -> Result<(), UpstreamError>;
}
