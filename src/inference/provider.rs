//! Chat-provider backend: route inference through `edgequake-llm`.
//!
//! Useful when no self-hosted model server is running: any vision-capable
//! provider the factory knows about (OpenAI, Anthropic, Gemini, Azure,
//! Ollama, ...) can stand in for the HTTP endpoint. A request maps onto one
//! chat call; the single completion comes back as a one-element output list.

use super::{InferenceClient, InferenceMessageContent, InferenceRequest, Role};
use crate::error::{InferenceError, WorkerError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// An [`InferenceClient`] backed by an `edgequake-llm` chat provider.
#[derive(Clone)]
pub struct ProviderInferenceClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderInferenceClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("label", &self.label)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderInferenceClient {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    /// Abandon a chat call that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a provider, from most-specific to least-specific:
    ///
    /// 1. explicit `provider_name` (+ optional `model`),
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set,
    /// 3. `OPENAI_API_KEY` present → OpenAI,
    /// 4. whatever `ProviderFactory::from_env` detects.
    pub fn resolve(provider_name: Option<&str>, model: Option<&str>) -> Result<Self, WorkerError> {
        if let Some(name) = provider_name {
            let model = model.unwrap_or(DEFAULT_MODEL);
            return create(name, model);
        }

        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                return create(&prov, &model);
            }
        }

        if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
            if !openai_key.is_empty() {
                return create("openai", model.unwrap_or(DEFAULT_MODEL));
            }
        }

        let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
            WorkerError::InvalidConfig(format!(
                "No LLM provider could be auto-detected from environment: {e}"
            ))
        })?;
        Ok(Self::new(llm_provider, "auto"))
    }
}

fn create(provider_name: &str, model: &str) -> Result<ProviderInferenceClient, WorkerError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        WorkerError::InvalidConfig(format!("LLM provider '{provider_name}': {e}"))
    })?;
    Ok(ProviderInferenceClient::new(
        provider,
        format!("{provider_name}/{model}"),
    ))
}

/// Strip the `data:<mime>;base64,` prefix, keeping the payload.
fn data_uri_payload(uri: &str) -> &str {
    match uri.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => uri,
    }
}

/// Convert our request into the provider's chat messages.
fn to_chat_messages(request: &InferenceRequest) -> Vec<ChatMessage> {
    request
        .messages
        .iter()
        .map(|message| {
            let mut text = Vec::new();
            let mut images = Vec::new();
            for part in &message.content {
                match part {
                    InferenceMessageContent::Text { text: t } => text.push(t.as_str()),
                    InferenceMessageContent::Image { image } => images.push(
                        ImageData::new(data_uri_payload(image), "image/png").with_detail("high"),
                    ),
                }
            }
            let text = text.join("\n\n");
            match message.role {
                Role::User => ChatMessage::user_with_images(&text, images),
                Role::Assistant => ChatMessage::assistant(&text),
            }
        })
        .collect()
}

#[async_trait]
impl InferenceClient for ProviderInferenceClient {
    async fn call(&self, request: &InferenceRequest) -> Result<Vec<String>, InferenceError> {
        request.ensure_not_empty()?;

        let messages = to_chat_messages(request);
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let chat = self.provider.chat(&messages, Some(&options));
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, chat).await.map_err(|_| {
                InferenceError::Unavailable {
                    endpoint: self.label.clone(),
                    detail: format!("no response within {limit:?}"),
                }
            })?,
            None => chat.await,
        };
        let response = outcome.map_err(|e| InferenceError::Unavailable {
            endpoint: self.label.clone(),
            detail: e.to_string(),
        })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(vec![response.content])
    }
}
