use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    response: String,
}

/// Why a single call to the analysis server produced no usable answer.
///
/// The `Display` text is what ends up in front of the user, so it stays the
/// underlying error's own message.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Connect failure, timeout, or the body could not be read.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The body was not JSON or had no string `response` field.
    #[error("{0}")]
    Protocol(#[from] serde_json::Error),
}

pub struct AnalysisClient {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// One POST to `/analyze`. HTTP error statuses are read like any other
    /// response; only transport and parse failures are errors.
    pub async fn analyze_once(&self, text: &str) -> Result<String, AnalysisError> {
        let url = self.config.endpoint("/analyze");

        debug!("Sending analysis request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&AnalysisRequest { text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Analysis server answered {} ({} bytes)", status, body.len());

        let parsed: AnalysisResponse = serde_json::from_str(&body)?;
        Ok(parsed.response)
    }

    /// `analyze_once` under the given retry policy; the last error wins.
    pub async fn analyze(
        &self,
        text: &str,
        policy: &RetryPolicy,
    ) -> Result<String, AnalysisError> {
        policy.run(|_| self.analyze_once(text)).await
    }

    /// Probe `GET /health`. Only used to log reachability at start-up.
    pub async fn health(&self) -> Result<()> {
        let url = self.config.endpoint("/health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach analysis server at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Analysis server health check failed ({})", status);
        }
        Ok(())
    }
}
