use serde::Serialize;

use crate::chat::message::Message;
use crate::chat::transcript::Transcript;

/// Generation parameters sent with every chat-completion call.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 1000,
        }
    }
}

/// One chat-completions request envelope. Built per call, never retained.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub model: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatRequest {
    /// Builds an envelope from the system prompt and the transcript snapshot
    /// at call time. The pending user message is expected to already be the
    /// transcript's last entry.
    pub fn from_transcript(
        system: &str,
        transcript: &Transcript,
        params: &GenerationParams,
        stream: bool,
    ) -> Self {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(system));
        messages.extend(transcript.messages().iter().cloned());
        Self::assemble(messages, params, stream)
    }

    /// Builds a one-shot envelope carrying a single user turn.
    pub fn single_turn(
        system: &str,
        user: Message,
        params: &GenerationParams,
        stream: bool,
    ) -> Self {
        Self::assemble(vec![Message::system(system), user], params, stream)
    }

    fn assemble(messages: Vec<Message>, params: &GenerationParams, stream: bool) -> Self {
        Self {
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            model: params.model.clone(),
            stream,
        }
    }
}
