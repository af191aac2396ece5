//! Chat-completion client core and relay.
//!
//! The crate folds a hosted model's streaming (SSE) or one-shot response
//! into an ordered conversation transcript, composes multimodal user
//! turns, and fronts the same API behind a small stateless relay server.

pub mod chat;
pub mod commands;
pub mod config;
pub mod relay;
