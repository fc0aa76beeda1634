// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vision model clients

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::{PictagError, Result};

/// A single-turn question about one image
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    /// `data:` URL or remote URL of the image
    pub image_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a JSON object
    pub json_output: bool,
}

/// What the model said, plus accounting
#[derive(Debug, Clone, PartialEq)]
pub struct VisionResponse {
    pub content: String,
    pub total_tokens: u64,
    pub model: String,
}

/// Anything that can answer a [`VisionRequest`]
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse>;
}

/// Client for OpenAI-compatible chat completion APIs
pub struct OpenAiVisionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl OpenAiVisionClient {
    /// Create a client from engine settings; the API key is read from the
    /// environment variable the settings name.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!("{} is not set; requests will be sent without a key", config.api_key_env);
        }

        // Normalize URL
        let base_url = config
            .url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: &request.prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: &request.image_url },
                    },
                ],
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!("Sending vision request: model={}", self.model);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PictagError::ApiStatus { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PictagError::ModelResponse("response has no message content".to_string()))?;

        Ok(VisionResponse {
            content,
            total_tokens: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
            model: parsed.model,
        })
    }
}

/// Backoff schedule for [`RetryingModel`]
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retries: config.retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay before attempt number `attempt` (1-based retry count).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Retries transient failures of the wrapped model with exponential backoff
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for RetryingModel<M> {
    async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.describe(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.policy.retries => {
                    attempt += 1;
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "Vision request failed ({}), retrying in {:?} (attempt {})",
                        e,
                        delay,
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
