//! Inference requests and the client seam.
//!
//! The pipeline speaks one small vocabulary to every backend: a request is a
//! list of role-tagged messages, each message a list of content parts, each
//! part either an image (base64 data URI) or a piece of text. Backends return
//! the raw generated text, one entry per output, without interpreting it.
//!
//! Two backends ship with the crate:
//!
//! * [`http::HttpInferenceClient`]: the JSON wire protocol of a self-hosted
//!   model server (`{"messages": [...]}` in, `{"outputs": [...]}` out).
//! * [`provider::ProviderInferenceClient`]: any chat provider supported by
//!   `edgequake-llm` (OpenAI, Anthropic, Gemini, Ollama, ...).

pub mod http;
pub mod provider;

use crate::error::InferenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content part of a message.
///
/// Modelled as an enum so a part can never carry both an image and text, or
/// neither. Serialises as `{"type": "image", "image": "..."}` or
/// `{"type": "text", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InferenceMessageContent {
    /// A base64 data URI, e.g. `data:image;base64,iVBOR...`.
    Image { image: String },
    Text { text: String },
}

impl InferenceMessageContent {
    pub fn image(data_uri: impl Into<String>) -> Self {
        Self::Image {
            image: data_uri.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A role-tagged sequence of content parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceMessage {
    pub role: Role,
    pub content: Vec<InferenceMessageContent>,
}

impl InferenceMessage {
    pub fn user(content: Vec<InferenceMessageContent>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// The request body sent to an inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub messages: Vec<InferenceMessage>,
}

impl InferenceRequest {
    /// A request holding exactly one user message.
    pub fn single(content: Vec<InferenceMessageContent>) -> Self {
        Self {
            messages: vec![InferenceMessage::user(content)],
        }
    }

    /// Reject requests that no backend could answer.
    pub fn ensure_not_empty(&self) -> Result<(), InferenceError> {
        if self.messages.is_empty() {
            return Err(InferenceError::EmptyRequest);
        }
        Ok(())
    }
}

/// The response body returned by an inference backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub outputs: Vec<String>,
}

/// A stateless handle to an inference backend.
///
/// Each call is exactly one attempt. Retries, if wanted, wrap the client;
/// the pipeline never retries on its own.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send `request` and return the raw generated outputs.
    async fn call(&self, request: &InferenceRequest) -> Result<Vec<String>, InferenceError>;
}
