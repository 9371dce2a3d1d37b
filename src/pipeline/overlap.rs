//! Overlap correction between two consecutive converted pages.
//!
//! Tables are the usual casualty of a page break: the model converts each
//! page on its own, so the rows at the top of page N+1 come out as a
//! header-less fragment. The corrector shows the model both pages and asks
//! for both back, repaired.
//!
//! The model's answer is trusted only when it has exactly two fenced blocks.
//! Anything else (too few, too many, an unreachable endpoint) keeps the
//! original pair. Correction can therefore never drop a page.

use super::extract::extract_markdown_blocks;
use crate::inference::{InferenceClient, InferenceMessageContent, InferenceRequest};
use crate::output::PageMarkdown;
use crate::prompts::{overlap_correction_prompt, OVERLAP_CORRECTION_PROMPT};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened at one page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// The model returned two blocks; both pages were replaced.
    Corrected,
    /// The model returned some other number of blocks; originals kept.
    Malformed { blocks: usize },
    /// The inference call failed; originals kept.
    Unavailable,
}

impl CorrectionOutcome {
    pub fn is_corrected(&self) -> bool {
        matches!(self, CorrectionOutcome::Corrected)
    }
}

/// The (possibly rewritten) pair of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionResult {
    pub previous: PageMarkdown,
    pub current: PageMarkdown,
    pub outcome: CorrectionOutcome,
}

/// Asks the inference backend to repair content split across a boundary.
#[derive(Clone)]
pub struct OverlapCorrector {
    client: Arc<dyn InferenceClient>,
    prompt: String,
}

impl OverlapCorrector {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            client,
            prompt: OVERLAP_CORRECTION_PROMPT.to_string(),
        }
    }

    /// Replace the default correction instruction.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Check the boundary between `previous` and `current`.
    ///
    /// Page indices are preserved; only the contents can change.
    pub async fn correct(&self, previous: PageMarkdown, current: PageMarkdown) -> CorrectionResult {
        let request = InferenceRequest::single(vec![InferenceMessageContent::text(
            overlap_correction_prompt(&self.prompt, &previous.content, &current.content),
        )]);

        let outputs = match self.client.call(&request).await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(
                    "Overlap check {} → {} failed, keeping originals: {}",
                    previous.page_index, current.page_index, e
                );
                return CorrectionResult {
                    previous,
                    current,
                    outcome: CorrectionOutcome::Unavailable,
                };
            }
        };

        let raw = outputs.first().map(String::as_str).unwrap_or_default();
        let blocks = extract_markdown_blocks(raw);

        match <[String; 2]>::try_from(blocks) {
            Ok([corrected_previous, corrected_current]) => {
                debug!(
                    "Overlap check {} → {}: corrected",
                    previous.page_index, current.page_index
                );
                CorrectionResult {
                    previous: PageMarkdown::new(previous.page_index, corrected_previous),
                    current: PageMarkdown::new(current.page_index, corrected_current),
                    outcome: CorrectionOutcome::Corrected,
                }
            }
            Err(blocks) => {
                warn!(
                    "Overlap check {} → {}: expected 2 blocks, got {}; keeping originals",
                    previous.page_index,
                    current.page_index,
                    blocks.len()
                );
                CorrectionResult {
                    previous,
                    current,
                    outcome: CorrectionOutcome::Malformed {
                        blocks: blocks.len(),
                    },
                }
            }
        }
    }
}
