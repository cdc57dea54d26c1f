use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisClient, AnalysisError};
use crate::config::{Config, HandlerMode};
use crate::platform::{ChatEvent, Replier};
use crate::retry::RetryPolicy;

pub const PROCESSING_MESSAGE: &str = "🔍 분석 중입니다... 잠시만 기다려주세요.";
pub const CONNECTION_ERROR_PREFIX: &str = "⚠️ 서버 연결 오류: ";
pub const RETRY_LATER_SUFFIX: &str = "\n잠시 후 다시 시도해주세요.";
pub const EMPTY_RESPONSE_MESSAGE: &str = "⚠️ 분석 결과가 비어 있습니다.";

/// Returns the trimmed text after `trigger`, or `None` if the (trimmed)
/// message does not start with it.
pub fn match_trigger<'a>(text: &'a str, trigger: &str) -> Option<&'a str> {
    text.trim().strip_prefix(trigger).map(str::trim)
}

/// Turns trigger messages into analysis requests and relays the answer.
pub struct MessageHandler {
    client: AnalysisClient,
    mode: HandlerMode,
    trigger: String,
    policy: RetryPolicy,
}

impl MessageHandler {
    /// `retry` only applies in [`HandlerMode::Retrying`]; the acknowledged
    /// handler always makes a single attempt.
    pub fn new(
        client: AnalysisClient,
        mode: HandlerMode,
        trigger: String,
        retry: RetryPolicy,
    ) -> Self {
        let policy = match mode {
            HandlerMode::Acknowledged => RetryPolicy::single(),
            HandlerMode::Retrying => retry,
        };
        Self {
            client,
            mode,
            trigger,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = AnalysisClient::new(config.analysis.clone())?;
        Ok(Self::new(
            client,
            config.handler.mode,
            config.handler.trigger.clone(),
            config.analysis.retry_policy(),
        ))
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    pub fn usage(&self) -> String {
        format!(
            "⚠️ 올바른 URL을 입력해주세요.\n사용법: {}https://뉴스URL",
            self.trigger
        )
    }

    /// Handle one chat message. Never fails: every outcome of a matching
    /// message ends as a reply, non-matching messages are ignored.
    pub async fn handle(&self, event: &ChatEvent, replier: &dyn Replier) {
        let Some(candidate) = match_trigger(&event.text, &self.trigger) else {
            return;
        };

        if !candidate.starts_with("http") {
            match self.mode {
                HandlerMode::Acknowledged => send(replier, &self.usage()).await,
                HandlerMode::Retrying => {
                    debug!("Ignoring non-URL analysis request in {}", event.room)
                }
            }
            return;
        }

        info!(
            "Analysis requested in {} by {} (group: {}): {}",
            event.room, event.sender, event.is_group_chat, candidate
        );

        if self.mode == HandlerMode::Acknowledged {
            send(replier, PROCESSING_MESSAGE).await;
        }

        let reply = match self.client.analyze(candidate, &self.policy).await {
            Ok(response) if response.trim().is_empty() => {
                warn!("Analysis server returned an empty response for {}", candidate);
                EMPTY_RESPONSE_MESSAGE.to_string()
            }
            Ok(response) => response,
            Err(e) => {
                error!("Analysis of {} failed: {}", candidate, e);
                self.render_error(&e)
            }
        };

        send(replier, &reply).await;
    }

    fn render_error(&self, err: &AnalysisError) -> String {
        match self.mode {
            HandlerMode::Acknowledged => format!("{}{}", CONNECTION_ERROR_PREFIX, err),
            HandlerMode::Retrying => {
                format!("{}{}{}", CONNECTION_ERROR_PREFIX, err, RETRY_LATER_SUFFIX)
            }
        }
    }
}

async fn send(replier: &dyn Replier, text: &str) {
    if let Err(e) = replier.reply(text).await {
        warn!("Failed to send reply: {:#}", e);
    }
}
