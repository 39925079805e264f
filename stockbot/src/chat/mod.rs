//! Chat platform session.
//!
//! The bot talks to exactly one channel. Outbound traffic goes through a shared
//! [`ChatSession`]; inbound messages arrive on an mpsc channel handed to the
//! session when it connects.

mod discord;

pub use discord::{DiscordConfig, DiscordSession};

use async_trait::async_trait;

use crate::Result;

/// Longest message the platform accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// A message seen in any channel the bot can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
}

/// Outbound side of a connected chat session.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Post a plain message to the configured channel.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Post a message read aloud by text-to-speech.
    async fn send_tts(&self, text: &str) -> Result<()>;

    /// Disconnect. Further sends may fail.
    async fn close(&self);
}

/// Cut `text` to the platform limit on a char boundary.
pub fn truncate_message(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
