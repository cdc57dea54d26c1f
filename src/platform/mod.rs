pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A chat message as the handler sees it, independent of the platform.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Platform-specific chat/room ID as string
    pub room: String,
    /// The message text
    pub text: String,
    /// Display name of the sender
    pub sender: String,
    pub is_group_chat: bool,
}

/// Sends text back into the room an event came from.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, text: &str) -> Result<()>;
}
