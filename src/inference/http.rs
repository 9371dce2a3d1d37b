//! HTTP backend: a self-hosted vision model behind a JSON endpoint.
//!
//! ```text
//! POST <endpoint>
//! {"messages": [{"role": "user", "content": [{"type": "image", "image": "data:image;base64,..."}, ...]}]}
//!
//! 200 OK
//! {"outputs": ["<raw text>", ...]}
//! ```
//!
//! Non-2xx statuses and transport errors surface as [`InferenceError`]; the
//! body is never retried here.

use super::{InferenceClient, InferenceRequest, InferenceResponse};
use crate::error::InferenceError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in [`InferenceError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Client for the `{"messages"} → {"outputs"}` inference endpoint.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    /// Build a client for `endpoint` with a per-request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Unavailable {
                endpoint: endpoint.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn call(&self, request: &InferenceRequest) -> Result<Vec<String>, InferenceError> {
        request.ensure_not_empty()?;

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InferenceError::Unavailable {
                endpoint: self.endpoint.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        debug!(
            "Inference call to {} returned {} output(s)",
            self.endpoint,
            parsed.outputs.len()
        );
        Ok(parsed.outputs)
    }
}
