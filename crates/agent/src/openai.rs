//! OpenAI-compatible chat-completions client, used for both the OpenAI and
//! Ollama providers.

use std::time::Duration;

use async_trait::async_trait;
use echolab_core::config::{AppConfig, LlmProvider};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{AssistantReply, ChatRequest, LlmClient, LlmError};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a ChatRequest,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantReply,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            api_key,
            max_retries: 2,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let llm = &config.llm;
        if llm.provider == LlmProvider::OpenAi && llm.api_key.is_none() {
            return Err(LlmError::Configuration(
                "the openai provider needs llm.api_key".to_owned(),
            ));
        }

        let client = Self::new(
            config.llm_base_url(),
            llm.model.clone(),
            llm.api_key.clone(),
            Duration::from_secs(llm.timeout_secs),
        )?;
        Ok(client.with_max_retries(llm.max_retries))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First backoff delay; each further retry doubles it.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(1_u32 << attempt.saturating_sub(1).min(10))
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<AssistantReply, LlmError> {
        let mut builder =
            self.http.post(self.endpoint()).json(&CompletionBody { model: &self.model, request });
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(status = %status, model = %self.model, "completion response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|error| LlmError::Decode(error.to_string()))?;
        parsed.choices.into_iter().next().map(|choice| choice.message).ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply, LlmError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }

            match self.send_once(request).await {
                Err(error) if is_transient(&error) && attempt < self.max_retries => {
                    warn!(attempt, error = %error, "transient language model error, will retry");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Rate limits, server errors and transport failures are worth another try.
fn is_transient(error: &LlmError) -> bool {
    match error {
        LlmError::Status { status, .. } => StatusCode::from_u16(*status)
            .map(|status| status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
            .unwrap_or(false),
        LlmError::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
        LlmError::Decode(_) | LlmError::EmptyResponse | LlmError::Configuration(_) => false,
    }
}
