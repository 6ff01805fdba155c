use std::time::Duration;

use async_trait::async_trait;
use meetspace_common::{ChatTurn, Error, Result};
use meetspace_config::LlmConfig;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::providers::{
    CompletionBackend, FragmentStream, INVALID_KEY_NOTICE, RATE_LIMIT_NOTICE, api_error_notice,
    connection_failed_notice, notice_stream,
};
use crate::sse::decode_fragments;

/// Request parameters shared by every completion a provider sends.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&LlmConfig> for CompletionSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// Streaming client for OpenAI-compatible Chat Completions APIs
/// (Groq by default).
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    settings: CompletionSettings,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: impl Into<String>, settings: CompletionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Completion(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            settings,
        })
    }

    pub fn from_config(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        Self::new(api_key, CompletionSettings::from(config))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatTurn]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: true,
            messages,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatProvider {
    fn provider_id(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    #[instrument(skip(self, messages), fields(model = %self.settings.model, turns = messages.len()))]
    async fn stream_completion(&self, messages: &[ChatTurn]) -> FragmentStream {
        let body = self.build_request(messages);
        debug!("completion stream request to {}", self.endpoint());

        let response = match self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("completion request failed: {e}");
                return notice_stream(connection_failed_notice(e));
            }
        };

        match response.status() {
            StatusCode::OK => decode_fragments(response.bytes_stream()),
            StatusCode::UNAUTHORIZED => {
                warn!("completion API rejected the API key");
                notice_stream(INVALID_KEY_NOTICE)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("completion API rate limit hit");
                notice_stream(RATE_LIMIT_NOTICE)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!("completion API error: status={status}");
                notice_stream(api_error_notice(status.as_u16(), &body))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
    messages: &'a [ChatTurn],
}
