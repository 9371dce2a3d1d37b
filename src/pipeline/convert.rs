//! Page conversion: one page image in, one page of Markdown out.
//!
//! Failure here is always page-local. Whatever goes wrong (the image will
//! not encode, the endpoint is down, the model answers without a fence) the
//! caller gets a [`PageError`] and decides to skip the page; nothing in this
//! module can abort a document.

use super::encode::encode_page;
use super::extract::extract_markdown_blocks;
use super::render::Page;
use crate::error::PageError;
use crate::inference::{InferenceClient, InferenceMessageContent, InferenceRequest};
use crate::output::PageMarkdown;
use crate::prompts::PAGE_TO_MARKDOWN_PROMPT;
use std::sync::Arc;
use tracing::debug;

/// Converts rendered pages to Markdown through an inference backend.
#[derive(Clone)]
pub struct PageConverter {
    client: Arc<dyn InferenceClient>,
    prompt: String,
}

impl PageConverter {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            client,
            prompt: PAGE_TO_MARKDOWN_PROMPT.to_string(),
        }
    }

    /// Replace the default conversion instruction.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Convert one rendered page.
    pub async fn convert(&self, page: &Page) -> Result<PageMarkdown, PageError> {
        let image = encode_page(&page.image).map_err(|e| PageError::ConversionFailed {
            page: page.index,
            detail: format!("image encoding failed: {e}"),
        })?;
        self.convert_encoded(page.index, image).await
    }

    /// Convert a page whose image is already a base64 data URI.
    ///
    /// Only the first fenced block of the response is kept.
    pub async fn convert_encoded(
        &self,
        page_index: usize,
        image_data_uri: String,
    ) -> Result<PageMarkdown, PageError> {
        let request = InferenceRequest::single(vec![
            InferenceMessageContent::image(image_data_uri),
            InferenceMessageContent::text(self.prompt.as_str()),
        ]);

        let outputs = self
            .client
            .call(&request)
            .await
            .map_err(|e| PageError::ConversionFailed {
                page: page_index,
                detail: e.to_string(),
            })?;

        let raw = outputs.first().map(String::as_str).unwrap_or_default();
        let mut blocks = extract_markdown_blocks(raw);
        if blocks.len() > 1 {
            debug!(
                "Page {}: keeping first of {} markdown blocks",
                page_index,
                blocks.len()
            );
        }
        if blocks.is_empty() {
            return Err(PageError::ConversionFailed {
                page: page_index,
                detail: "response contained no markdown block".to_string(),
            });
        }

        Ok(PageMarkdown::new(page_index, blocks.swap_remove(0)))
    }
}
