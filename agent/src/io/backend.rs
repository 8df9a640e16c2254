//! Language-model backend abstraction.
//!
//! The [`Backend`] trait decouples the agent loop from the HTTP API. Tests use
//! scripted backends that replay predetermined responses. [`BackendClient`]
//! routes every call through the [`ResponseCache`] when one is configured.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Message, StepBatch};
use crate::io::cache::{CacheRequest, ResponseCache};
use crate::io::config::BackendConfig;
use crate::io::prompt::RenderedPrompt;
use crate::io::schema::parse_batch;

/// Named JSON Schema the backend output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

/// Parameters for one backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// `None` requests free text.
    pub response_format: Option<ResponseFormat>,
}

/// Abstraction over completion backends.
pub trait Backend {
    /// Return the raw text of the model's reply.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Backend speaking the OpenAI chat completions API.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build backend http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("read api key from ${}", config.api_key_env))?;
        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl Backend for OpenAiBackend {
    #[instrument(skip_all, fields(model = %request.model, structured = request.response_format.is_some()))]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(messages = request.messages.len(), "sending completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .with_context(|| format!("POST {url}"))?;
        let status = response.status().as_u16();
        let body = response.text().context("read completion response")?;
        extract_content(status, &body)
    }
}

/// JSON payload for a chat completion request.
pub fn request_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
    });
    if let Some(format) = &request.response_format {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": format.name,
                "strict": true,
                "schema": format.schema,
            },
        });
    }
    body
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

/// Pull the reply text out of a chat completion response.
pub fn extract_content(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        warn!(status, "backend returned error status");
        bail!("backend returned status {status}: {body}");
    }
    let parsed: ChatResponse = serde_json::from_str(body).context("parse completion response")?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("completion response has no choices"))?;
    if let Some(refusal) = message.refusal {
        bail!("model refused the request: {refusal}");
    }
    Ok(message.content.unwrap_or_default())
}

/// Backend handle plus optional cache, threaded through every caller.
pub struct BackendClient<'a, B: Backend + ?Sized> {
    backend: &'a B,
    cache: Option<&'a ResponseCache>,
}

impl<'a, B: Backend + ?Sized> BackendClient<'a, B> {
    pub fn new(backend: &'a B, cache: Option<&'a ResponseCache>) -> Self {
        Self { backend, cache }
    }

    /// Free-text completion of a single rendered prompt.
    ///
    /// Cached by template source, arguments and model.
    pub fn complete_text(&self, prompt: &RenderedPrompt, model: &str) -> Result<String> {
        let compute = || {
            info!(model, "querying backend");
            self.backend.complete(&CompletionRequest {
                model: model.to_string(),
                messages: vec![Message::user(prompt.text.as_str())],
                response_format: None,
            })
        };
        match self.cache {
            Some(cache) => cache.get_or_compute(
                &CacheRequest {
                    template_source: prompt.template_source,
                    args: &prompt.args,
                    model,
                    messages: None,
                    rendered: &prompt.text,
                },
                compute,
            ),
            None => compute(),
        }
    }

    /// Structured completion of a conversation into a step batch.
    ///
    /// Cached by format name, model and messages. Only responses that parse as
    /// a batch are stored.
    pub fn complete_steps(
        &self,
        messages: &[Message],
        model: &str,
        format: &ResponseFormat,
    ) -> Result<StepBatch> {
        let request = CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            response_format: Some(format.clone()),
        };
        let compute = || -> Result<String> {
            info!(model, format = %format.name, "querying backend");
            let text = self.backend.complete(&request)?;
            parse_batch(&text)?;
            Ok(text)
        };
        let text = match self.cache {
            Some(cache) => {
                let args = json!({});
                let rendered =
                    serde_json::to_string_pretty(messages).context("serialize messages")?;
                cache.get_or_compute(
                    &CacheRequest {
                        template_source: &format.name,
                        args: &args,
                        model,
                        messages: Some(messages),
                        rendered: &rendered,
                    },
                    compute,
                )?
            }
            None => compute()?,
        };
        let batch = parse_batch(&text)?;
        debug!(steps = batch.len(), "received step batch");
        Ok(batch)
    }
}
