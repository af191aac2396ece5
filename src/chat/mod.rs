//! Conversation core for chat-completion clients.
//!
//! The module contains the transcript and session state machine, the
//! per-call request envelope, the streaming and non-streaming API calls,
//! and the multimodal user-turn composer shared by the CLI and the relay.

/// Endpoint/key resolution, request plumbing, and the error type.
pub mod api;
/// Non-streaming completion call.
pub mod client;
/// Multimodal user-turn composer.
pub mod composer;
/// Conversation message and content-part types.
pub mod message;
/// Per-call request envelope.
pub mod request;
/// Session state machine: transcript + live buffer + turn tokens.
pub mod session;
/// Streaming-response accumulator.
pub mod stream;
/// Ordered transcript of finalized messages.
pub mod transcript;
