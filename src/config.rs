use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandlerMode {
    /// Usage error on bad input, "processing" ack, single attempt.
    #[default]
    Acknowledged,
    /// Silent on bad input, bounded retry with a fixed delay.
    Retrying,
}

impl std::fmt::Display for HandlerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerMode::Acknowledged => write!(f, "acknowledged"),
            HandlerMode::Retrying => write!(f, "retrying"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub handler: HandlerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Empty means every user may talk to the bot.
    #[serde(default)]
    pub allowed_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Policy used by the retrying handler.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    /// Base URL without a trailing slash, so endpoint paths can be appended.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandlerConfig {
    #[serde(default)]
    pub mode: HandlerMode,
    #[serde(default = "default_trigger")]
    pub trigger: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            mode: HandlerMode::default(),
            trigger: default_trigger(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_trigger() -> String {
    "분석 ".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.analysis.base_url.trim().is_empty() {
            anyhow::bail!("[analysis] base_url must not be empty");
        }
        let trigger = &config.handler.trigger;
        if trigger.trim().is_empty() {
            anyhow::bail!("[handler] trigger must not be empty");
        }
        // Messages are trimmed before matching
        if trigger.trim_start() != trigger {
            anyhow::bail!("[handler] trigger must not start with whitespace");
        }

        Ok(config)
    }

    /// Whether the given Telegram user may use the bot.
    pub fn is_user_allowed(&self, user_id: u64) -> bool {
        self.telegram.allowed_user_ids.is_empty()
            || self.telegram.allowed_user_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[telegram]
bot_token = "123:abc"

[analysis]
base_url = "https://example.replit.app"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert!(config.telegram.allowed_user_ids.is_empty());
        assert_eq!(config.analysis.timeout(), Duration::from_secs(60));
        assert_eq!(config.analysis.max_retries, 2);
        assert_eq!(config.analysis.retry_delay_ms, 2000);
        assert_eq!(config.handler.mode, HandlerMode::Acknowledged);
        assert_eq!(config.handler.trigger, "분석 ");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config::parse(MINIMAL).unwrap();
        let policy = config.analysis.retry_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "t"
allowed_user_ids = [111, 222]

[analysis]
base_url = "http://localhost:8000/"
timeout_secs = 5
max_retries = 4
retry_delay_ms = 10

[handler]
mode = "retrying"
trigger = "analyze "
"#,
        )
        .unwrap();
        assert_eq!(config.handler.mode, HandlerMode::Retrying);
        assert_eq!(config.handler.trigger, "analyze ");
        assert_eq!(config.analysis.retry_policy().max_attempts(), 4);
        assert!(config.is_user_allowed(222));
        assert!(!config.is_user_allowed(333));
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let config = Config::parse(MINIMAL).unwrap();
        assert!(config.is_user_allowed(42));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = Config::parse(
            r#"
[telegram]
bot_token = "t"

[analysis]
base_url = "http://localhost:8000/"
"#,
        )
        .unwrap();
        assert_eq!(
            config.analysis.endpoint("/analyze"),
            "http://localhost:8000/analyze"
        );
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = Config::parse(
            r#"
[telegram]
bot_token = "t"

[analysis]
base_url = "http://localhost"

[handler]
mode = "eager"
"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = Config::parse(
            r#"
[telegram]
bot_token = "t"

[analysis]
base_url = "  "
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_leading_whitespace_trigger_rejected() {
        let err = Config::parse(
            r#"
[telegram]
bot_token = "t"

[analysis]
base_url = "http://localhost"

[handler]
trigger = " 분석"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.analysis.base_url, "https://example.replit.app");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/newsbot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
