//! Values produced by the pipeline and the orchestrator.

use serde::{Deserialize, Serialize};

/// The Markdown of one successfully converted page.
///
/// Only the overlap corrector rewrites `content`, and only while the page is
/// still held by the pipeline; once emitted it is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarkdown {
    /// 0-based position of the page in the source document.
    pub page_index: usize,
    pub content: String,
}

impl PageMarkdown {
    pub fn new(page_index: usize, content: impl Into<String>) -> Self {
        Self {
            page_index,
            content: content.into(),
        }
    }

    /// Human-readable label, e.g. `page_3`.
    pub fn label(&self) -> String {
        format!("page_{}", self.page_index)
    }
}

/// Counters accumulated over one document walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Pages handed to the page converter.
    pub pages_seen: usize,
    /// Pages that produced Markdown (and were, or will be, emitted).
    pub pages_converted: usize,
    /// Pages dropped after a conversion failure.
    pub pages_failed: usize,
    /// Boundaries where the model returned a usable correction.
    pub corrections_applied: usize,
    /// Boundaries where the originals were kept (malformed or failed correction).
    pub corrections_kept: usize,
}

/// Summary of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    /// Storage key the document was uploaded to.
    pub output_key: String,
    /// Byte length of the uploaded document.
    pub output_bytes: usize,
    pub stats: PipelineStats,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_zero_based_index() {
        assert_eq!(PageMarkdown::new(0, "x").label(), "page_0");
        assert_eq!(PageMarkdown::new(12, "x").label(), "page_12");
    }
}
