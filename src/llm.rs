//! Model callers over HTTP.
//!
//! Implements [`ModelCaller`] for:
//! - **[`OpenAiCaller`]**: `POST {url}/v1/chat/completions`, key from `OPENAI_API_KEY`.
//! - **[`OllamaCaller`]**: `POST {url}/api/chat` with `stream: false`.
//! - **[`DisabledCaller`]**: always errors; lets retrieval-only commands run
//!   without a model.
//!
//! Each request carries a single user message, temperature 0, and the
//! per-call timeout from `[llm].timeout_secs`. No retries: a failed call is
//! reported to the orchestrator, which counts it as zero findings.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub use creview_core::llm::ModelCaller;
use creview_core::{Result, ReviewError};

use crate::config::LlmConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a JSON body and decode a JSON response, mapping every failure to
/// [`ReviewError::ModelCall`].
async fn post_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    backend: &str,
) -> Result<T> {
    let response = request.json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            ReviewError::model_call(format!("{} request timed out", backend))
        } else {
            ReviewError::model_call(format!("{} request failed: {}", backend, e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ReviewError::model_call(format!(
            "{} API error {}: {}",
            backend, status, text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ReviewError::model_call(format!("{} response decode failed: {}", backend, e)))
}

// ============ Disabled ============

pub struct DisabledCaller;

#[async_trait]
impl ModelCaller for DisabledCaller {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn call(&self, _prompt: &str, _model: &str, _max_tokens: u32) -> Result<String> {
        Err(ReviewError::model_call(
            "llm provider is disabled; set [llm].provider in the config",
        ))
    }
}

// ============ OpenAI ============

/// Chat completions against the OpenAI API or any compatible gateway.
pub struct OpenAiCaller {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCaller {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ModelCaller for OpenAiCaller {
    fn name(&self) -> &str {
        "openai"
    }

    async fn call(&self, prompt: &str, model: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
            "max_tokens": max_tokens,
        });
        let endpoint = format!("{}/v1/chat/completions", self.url.trim_end_matches('/'));
        tracing::debug!(model, prompt_chars = prompt.len(), "calling OpenAI");

        let request = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let completion: ChatCompletion = post_json(request, &body, "OpenAI").await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReviewError::model_call("OpenAI response had no message content"))
    }
}

// ============ Ollama ============

pub struct OllamaCaller {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaChat {
    message: ChatMessage,
}

impl OllamaCaller {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ModelCaller for OllamaCaller {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn call(&self, prompt: &str, model: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": { "temperature": 0, "num_predict": max_tokens },
        });
        let endpoint = format!("{}/api/chat", self.url.trim_end_matches('/'));
        tracing::debug!(model, prompt_chars = prompt.len(), "calling Ollama");

        let chat: OllamaChat = post_json(self.client.post(endpoint), &body, "Ollama").await?;
        chat.message
            .content
            .ok_or_else(|| ReviewError::model_call("Ollama response had no message content"))
    }
}

/// Create the [`ModelCaller`] named by `config.provider`.
///
/// | Config Value | Caller |
/// |-------------|--------|
/// | `"disabled"` | [`DisabledCaller`] |
/// | `"openai"` | [`OpenAiCaller`] |
/// | `"ollama"` | [`OllamaCaller`] |
pub fn create_caller(config: &LlmConfig) -> anyhow::Result<Arc<dyn ModelCaller>> {
    let caller: Arc<dyn ModelCaller> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledCaller),
        "openai" => Arc::new(OpenAiCaller::new(config)?),
        "ollama" => Arc::new(OllamaCaller::new(config)?),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    };
    tracing::info!(provider = caller.name(), model = config.model.as_str(), "model caller ready");
    Ok(caller)
}
