use crate::chat::message::MessageContent;
use crate::chat::transcript::Transcript;

/// Assistant message appended when a streaming call fails before any delta
/// arrives.
pub const STREAM_ERROR_MARKER: &str = "Error!!";

/// Token tying an in-flight model call to the session generation it was
/// started under. Mutations presenting a stale token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn(u64);

/// Conversation state machine for one UI session.
///
/// Owns the transcript and the single live buffer that accumulates the
/// in-progress assistant reply. At most one buffer exists at a time; it only
/// becomes part of the transcript when the turn finishes. `clear` bumps the
/// generation counter so that deltas and finalizations from a superseded
/// call land nowhere.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Transcript,
    live: Option<String>,
    generation: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The in-progress assistant text, if a stream is being accumulated.
    pub fn live_buffer(&self) -> Option<&str> {
        self.live.as_deref()
    }

    /// Appends the user message and opens a new turn, superseding any turn
    /// still in flight.
    pub fn begin_turn(&mut self, content: MessageContent) -> Turn {
        self.generation += 1;
        self.live = None;
        self.transcript.append_user(content);
        Turn(self.generation)
    }

    /// Grows the live buffer by one delta. Returns false (and mutates
    /// nothing) when the turn is stale.
    pub fn apply_delta(&mut self, turn: Turn, delta: &str) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.live.get_or_insert_with(String::new).push_str(delta);
        true
    }

    /// Commits the live buffer as one assistant message. An empty string is
    /// committed when no delta ever arrived.
    pub fn finish_turn(&mut self, turn: Turn) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        let content = self.live.take().unwrap_or_default();
        self.transcript.append_assistant(content);
        true
    }

    /// Appends an error-marker assistant message, bypassing the buffer. Used
    /// when the streaming call fails before accumulation starts.
    pub fn fail_turn(&mut self, turn: Turn, marker: impl Into<String>) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.live = None;
        self.transcript.append_assistant(marker);
        true
    }

    /// Drops the live buffer without committing anything. Used when the
    /// stream dies mid-turn and the partial text must not be salvaged.
    pub fn cancel_turn(&mut self, turn: Turn) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.live = None;
        true
    }

    /// Appends one finalized assistant message. The non-streaming path; no
    /// intermediate buffer is involved.
    pub fn push_assistant(&mut self, turn: Turn, content: impl Into<String>) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.transcript.append_assistant(content);
        true
    }

    /// Empties the transcript, drops any live buffer, and invalidates every
    /// outstanding turn token.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.live = None;
        self.transcript.clear();
    }

    fn is_current(&self, turn: Turn) -> bool {
        turn.0 == self.generation
    }
}
