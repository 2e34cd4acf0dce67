use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use banter_core::client::{CompletionClient, SamplingConfig};
use banter_core::errors::CompletionError;
use banter_core::turns::Turn;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Completion client for an OpenAI-style chat-completions endpoint.
/// Non-streaming: the engine wants exactly the first choice's text.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_url: String,
    sampling: SamplingConfig,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, sampling: SamplingConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::NetworkError(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: API_URL.to_string(),
            sampling,
        })
    }

    /// Point the client at a different endpoint (compatible proxies, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_body(&self, system_prompt: &str, history: &[Turn], new_turn: &Turn) -> serde_json::Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(json!({ "role": "system", "content": system_prompt }));
        for turn in history {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.content }));
        }
        messages.push(json!({ "role": new_turn.role.as_str(), "content": new_turn.content }));

        json!({
            "model": self.sampling.model,
            "messages": messages,
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
            "top_p": self.sampling.top_p,
            "frequency_penalty": self.sampling.frequency_penalty,
            "presence_penalty": self.sampling.presence_penalty,
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.sampling.model
    }

    #[instrument(skip_all, fields(model = %self.sampling.model, history_len = history.len()))]
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        new_turn: &Turn,
    ) -> Result<String, CompletionError> {
        let body = self.build_body(system_prompt, history, new_turn);

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(REQUEST_TIMEOUT)
                } else {
                    CompletionError::NetworkError(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status, body));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".into()))
    }
}
