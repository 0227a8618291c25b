//! The per-connection turn state machine.
//!
//! A connection cycles through `Listening -> Draining -> Responding ->
//! Listening` until the client goes away. Upstream failures end the current
//! turn with an `ERROR` signal and never tear the connection down; only
//! transport failures do.
//!
//! While a turn is responding the client socket is still read, but only to
//! notice a disconnect. Everything else is deferred and replayed in arrival
//! order once the relay is listening again, so turn boundaries are kept.

use super::protocol::{ClientControl, ClientFrame, Inbound, ServerSignal};
use axum::extract::ws::Message;
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::{collections::VecDeque, fmt::Display, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use voice_relay_core::{
    LiveClient, LiveSession, OutputEvent, Personalization, TurnBuffer, TurnOutcome, UpstreamError,
};

/// Failures that end the client connection.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("client transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Listening,
    Draining,
    Responding,
    Closed,
}

/// How the responding phase of a turn stopped.
enum ResponseEnd {
    Completed,
    Failed(UpstreamError),
    Disconnected,
}

/// Owns one client connection's conversation.
pub struct TurnRelay {
    client: Arc<dyn LiveClient>,
    base_instruction: Arc<String>,
    idle_timeout: Option<Duration>,
    state: RelayState,
    buffer: TurnBuffer,
    persona: Personalization,
    turns: u64,
    /// Frames received while responding, oldest first.
    deferred: VecDeque<ClientFrame>,
}

impl TurnRelay {
    pub fn new(
        client: Arc<dyn LiveClient>,
        base_instruction: Arc<String>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            base_instruction,
            idle_timeout,
            state: RelayState::Listening,
            buffer: TurnBuffer::new(),
            persona: Personalization::new(),
            turns: 0,
            deferred: VecDeque::new(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Number of turns that reached the draining phase.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Drives the connection until the client disconnects.
    ///
    /// Returns `Ok(())` on a clean disconnect and `Err` when sending to the
    /// client fails. Any upstream session opened by the relay is closed before
    /// this returns.
    pub async fn run<S, R, E>(&mut self, sink: &mut S, stream: &mut R) -> Result<(), RelayError>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        while self.state != RelayState::Closed {
            self.listen(stream).await;
            if self.state == RelayState::Draining {
                if let Err(e) = self.end_turn(sink, stream).await {
                    self.state = RelayState::Closed;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Collects frames until the client ends the turn or goes away.
    ///
    /// Deferred frames are replayed before the socket is read again. The idle
    /// timeout only covers socket reads.
    async fn listen<R, E>(&mut self, stream: &mut R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            let frame = match self.deferred.pop_front() {
                Some(frame) => frame,
                None => match self.read_listening(stream).await {
                    Some(frame) => frame,
                    None => {
                        self.state = RelayState::Closed;
                        return;
                    }
                },
            };

            match frame {
                ClientFrame::Audio(chunk) => self.buffer.append(chunk),
                ClientFrame::Control(ClientControl::Config { user_name }) => {
                    self.persona.set(&user_name);
                    info!("Updated personalization for upcoming turns.");
                }
                ClientFrame::Control(ClientControl::EndTurn) => {
                    debug!(chunks = self.buffer.len(), bytes = self.buffer.byte_len(), "End of turn received.");
                    self.state = RelayState::Draining;
                    return;
                }
            }
        }
    }

    /// Reads one frame from the socket, giving up after the idle timeout.
    async fn read_listening<R, E>(&self, stream: &mut R) -> Option<ClientFrame>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let frame = match self.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, next_frame(stream)).await {
                Ok(frame) => frame,
                Err(_) => {
                    info!(idle_secs = limit.as_secs(), "Client idle while listening; closing.");
                    return None;
                }
            },
            None => next_frame(stream).await,
        };
        if frame.is_none() {
            info!("Client disconnected.");
        }
        frame
    }

    /// Drains the buffer and, if it held audio, answers the turn.
    async fn end_turn<S, R, E>(&mut self, sink: &mut S, stream: &mut R) -> Result<(), RelayError>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let chunks = self.buffer.drain();
        self.turns += 1;
        if chunks.is_empty() {
            info!(turn = self.turns, outcome = %TurnOutcome::Empty, "No audio collected; waiting for next turn.");
            self.state = RelayState::Listening;
            return Ok(());
        }
        self.state = RelayState::Responding;
        self.respond(chunks, sink, stream).await
    }

    /// Runs the responding phase for one non-empty turn.
    async fn respond<S, R, E>(
        &mut self,
        chunks: Vec<Bytes>,
        sink: &mut S,
        stream: &mut R,
    ) -> Result<(), RelayError>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let turn = self.turns;
        let instruction = self.persona.build_instruction(&self.base_instruction);
        info!(turn, chunks = chunks.len(), "Opening upstream session.");

        let client = self.client.clone();
        let mut opening = client.open(&instruction);
        let opened = loop {
            tokio::select! {
                opened = &mut opening => break opened,
                frame = next_frame(stream) => match frame {
                    Some(frame) => self.deferred.push_back(frame),
                    None => {
                        info!(turn, "Client disconnected while opening upstream session.");
                        self.state = RelayState::Closed;
                        return Ok(());
                    }
                },
            }
        };

        let mut session = match opened {
            Ok(session) => session,
            Err(e) => {
                warn!(turn, error = %e, outcome = %TurnOutcome::UpstreamError, "Could not open upstream session.");
                self.state = RelayState::Listening;
                return send_signal(sink, ServerSignal::Error).await;
            }
        };

        let result = self.forward(session.as_mut(), chunks, sink, stream).await;

        if let Err(e) = session.close().await {
            debug!(turn, error = %e, "Upstream session did not close cleanly.");
        }

        match result {
            Ok(ResponseEnd::Completed) => {
                info!(turn, outcome = %TurnOutcome::Completed, deferred = self.deferred.len(), "Turn finished.");
                self.state = RelayState::Listening;
                send_signal(sink, ServerSignal::ResponseComplete).await
            }
            Ok(ResponseEnd::Failed(e)) => {
                warn!(turn, error = %e, outcome = %TurnOutcome::UpstreamError, "Turn failed.");
                self.state = RelayState::Listening;
                send_signal(sink, ServerSignal::Error).await
            }
            Ok(ResponseEnd::Disconnected) => {
                info!(turn, "Client disconnected while responding.");
                self.state = RelayState::Closed;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Feeds the turn's audio upstream and forwards the output to the client.
    ///
    /// The client stream is watched throughout so a disconnect is noticed
    /// while the model is still answering.
    async fn forward<S, R, E>(
        &mut self,
        session: &mut dyn LiveSession,
        chunks: Vec<Bytes>,
        sink: &mut S,
        stream: &mut R,
    ) -> Result<ResponseEnd, RelayError>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        for chunk in chunks {
            if let Err(e) = session.send_audio(chunk).await {
                return Ok(ResponseEnd::Failed(e));
            }
        }
        if let Err(e) = session.end_input().await {
            return Ok(ResponseEnd::Failed(e));
        }

        let mut events = session.receive();
        let mut forwarded = 0usize;
        loop {
            tokio::select! {
                frame = next_frame(stream) => match frame {
                    None => return Ok(ResponseEnd::Disconnected),
                    Some(frame) => self.deferred.push_back(frame),
                },
                event = events.next() => match event {
                    Some(Ok(OutputEvent::Audio(chunk))) => {
                        sink.send(Message::Binary(chunk))
                            .await
                            .map_err(|e| RelayError::Transport(e.to_string()))?;
                        forwarded += 1;
                    }
                    Some(Ok(OutputEvent::TurnComplete)) => {
                        debug!(forwarded, "Upstream signaled turn complete.");
                        return Ok(ResponseEnd::Completed);
                    }
                    Some(Err(e)) => return Ok(ResponseEnd::Failed(e)),
                    None => {
                        debug!(forwarded, "Upstream output ended without turn-complete marker.");
                        return Ok(ResponseEnd::Completed);
                    }
                },
            }
        }
    }
}

/// Reads the next meaningful client frame. `None` means the transport is gone.
async fn next_frame<R, E>(stream: &mut R) -> Option<ClientFrame>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        match stream.next().await {
            None => return None,
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving from client WebSocket.");
                return None;
            }
            Some(Ok(msg)) => match Inbound::classify(msg) {
                Inbound::Frame(frame) => return Some(frame),
                Inbound::Close => return None,
                Inbound::Ignored => continue,
            },
        }
    }
}

async fn send_signal<S>(sink: &mut S, signal: ServerSignal) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    sink.send(signal.into_message())
        .await
        .map_err(|e| RelayError::Transport(e.to_string()))
}
