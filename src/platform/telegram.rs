use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::handler::MessageHandler;
use crate::platform::{ChatEvent, Replier};

/// Telegram rejects messages over 4096 chars
const MAX_MESSAGE_LEN: usize = 4000;

/// Split long messages for Telegram's length limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Command name without the `@BotName` suffix Telegram adds in groups,
/// or `None` if the text is not a bare command.
fn command_name(text: &str) -> Option<&str> {
    let text = text.trim();
    if !text.starts_with('/') || text.contains(char::is_whitespace) {
        return None;
    }
    Some(text.split('@').next().unwrap_or(text))
}

/// Replies into the Telegram chat an update came from.
struct TelegramReplier {
    bot: Bot,
    chat_id: ChatId,
}

#[async_trait]
impl Replier for TelegramReplier {
    async fn reply(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.bot.send_message(self.chat_id, chunk).await?;
        }
        Ok(())
    }
}

/// Run the Telegram bot platform
pub async fn run(config: Arc<Config>, handler: Arc<MessageHandler>) -> Result<()> {
    let bot = Bot::new(&config.telegram.bot_token);

    info!("Starting Telegram platform...");

    let filter_config = config.clone();
    let update_handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            let user = msg.from.as_ref()?;
            if filter_config.is_user_allowed(user.id.0) {
                Some(msg)
            } else {
                None
            }
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, update_handler)
        .dependencies(dptree::deps![handler])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    handler: Arc<MessageHandler>,
) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let replier = TelegramReplier {
        bot: bot.clone(),
        chat_id: msg.chat.id,
    };

    if matches!(command_name(&text), Some("/start" | "/help")) {
        replier.reply(&handler.usage()).await.ok();
        return Ok(());
    }

    let event = ChatEvent {
        room: msg.chat.id.0.to_string(),
        text,
        sender: user.first_name.clone(),
        is_group_chat: msg.chat.is_group() || msg.chat.is_supergroup(),
    };

    handler.handle(&event, &replier).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc"]);
    }

    #[test]
    fn test_command_name_strips_bot_mention() {
        assert_eq!(command_name("/start"), Some("/start"));
        assert_eq!(command_name("/help@news_analysis_bot"), Some("/help"));
        assert_eq!(command_name("  /start@Bot "), Some("/start"));
        assert_eq!(command_name("분석 https://a"), None);
        assert_eq!(command_name("/start now"), None);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "분석".repeat(50);
        let chunks = split_message(&text, 10);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
