use bytes::Bytes;
use std::fmt;

/// Collects the client's audio chunks for the listening phase of one turn.
///
/// Chunks are opaque and kept in arrival order, which is the order they must
/// be replayed to the upstream session.
#[derive(Debug, Default)]
pub struct TurnBuffer {
    chunks: Vec<Bytes>,
    bytes: usize,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one audio chunk after all previously collected ones.
    pub fn append(&mut self, chunk: Bytes) {
        self.bytes += chunk.len();
        self.chunks.push(chunk);
    }

    /// Returns every chunk collected since the last drain and resets the buffer.
    ///
    /// An empty result is a valid outcome: the client ended a turn without
    /// speaking.
    pub fn drain(&mut self) -> Vec<Bytes> {
        self.bytes = 0;
        std::mem::take(&mut self.chunks)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload size of the buffered chunks.
    pub fn byte_len(&self) -> usize {
        self.bytes
    }
}

/// How a single listen-then-respond cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The upstream response was forwarded in full.
    Completed,
    /// No audio was collected, so no upstream session was opened.
    Empty,
    /// Opening, feeding, or reading the upstream session failed.
    UpstreamError,
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Completed => write!(f, "completed"),
            TurnOutcome::Empty => write!(f, "empty"),
            TurnOutcome::UpstreamError => write!(f, "upstream_error"),
        }
    }
}
