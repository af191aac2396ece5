/// One-shot question command.
pub mod ask;
/// Interactive conversation command.
pub mod chat;
/// Local config validation command.
pub mod config;
pub(crate) mod settings;
