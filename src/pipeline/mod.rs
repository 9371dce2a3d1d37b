//! Pipeline stages for turning one document into Markdown.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own with a scripted inference backend.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ convert ──▶ overlap ──▶ document
//! (pdfium)   (encode +   (pairwise   (ordered walk,
//!             VLM +       repair)     skip on failure)
//!             extract)
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG-encode and base64-wrap each page image
//! 3. [`extract`]: pull fenced Markdown blocks out of a model response
//! 4. [`convert`]: one page image → one page of Markdown
//! 5. [`overlap`]: repair content split across a page boundary
//! 6. [`document`]: the stateful, lazy walk over all pages

pub mod convert;
pub mod document;
pub mod encode;
pub mod extract;
pub mod overlap;
pub mod render;

pub use convert::PageConverter;
pub use document::{DocumentPipeline, DocumentStream};
pub use extract::extract_markdown_blocks;
pub use overlap::{CorrectionOutcome, CorrectionResult, OverlapCorrector};
pub use render::{DocumentRenderer, Page, PdfiumRenderer};

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted inference backend for unit tests.

    use super::render::Page;
    use crate::error::InferenceError;
    use crate::inference::{InferenceClient, InferenceRequest};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    type Reply = Result<Vec<String>, InferenceError>;

    /// Answers calls from a fixed script, in order, and records every request.
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<InferenceRequest>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<InferenceRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn call(&self, request: &InferenceRequest) -> Reply {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(InferenceError::Unavailable {
                        endpoint: "script".into(),
                        detail: "script exhausted".into(),
                    })
                })
        }
    }

    /// A reply holding one ```markdown block per entry.
    pub fn fenced(blocks: &[&str]) -> Reply {
        let body = blocks
            .iter()
            .map(|b| format!("```markdown\n{b}\n```"))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(vec![body])
    }

    pub fn blank_page(index: usize) -> Page {
        Page {
            index,
            image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255; 4]))),
        }
    }

    pub fn blank_pages(n: usize) -> Vec<Page> {
        (0..n).map(blank_page).collect()
    }
}
