//! Progress-callback trait for per-page pipeline events.
//!
//! Attach an [`Arc<dyn PipelineProgressCallback>`] to a
//! [`crate::pipeline::DocumentPipeline`] to observe the walk: page starts,
//! conversions, skipped pages, and overlap checks. The worker binary uses it
//! to drive a terminal progress bar; a queue deployment can forward events to
//! its own job bookkeeping.
//!
//! # Example
//!
//! ```rust
//! use pdf2md_worker::PipelineProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Skipped(AtomicUsize);
//!
//! impl PipelineProgressCallback for Skipped {
//!     fn on_page_error(&self, _page_index: usize, _total_pages: usize, _error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the document pipeline as it walks a document.
///
/// All page indices are 0-based. Every method has a no-op default so
/// implementations only override what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first page is converted.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the conversion request for a page is sent.
    fn on_page_start(&self, page_index: usize, total_pages: usize) {
        let _ = (page_index, total_pages);
    }

    /// Called when a page converted successfully.
    ///
    /// `markdown_len` is the byte length before any overlap correction.
    fn on_page_complete(&self, page_index: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_index, total_pages, markdown_len);
    }

    /// Called when a page failed and is dropped from the output.
    fn on_page_error(&self, page_index: usize, total_pages: usize, error: &str) {
        let _ = (page_index, total_pages, error);
    }

    /// Called after the boundary between two successful pages was checked.
    ///
    /// `corrected` is false when the originals were kept.
    fn on_overlap_checked(&self, previous_index: usize, current_index: usize, corrected: bool) {
        let _ = (previous_index, current_index, corrected);
    }

    /// Called once after every page has been attempted.
    fn on_document_complete(&self, total_pages: usize, converted: usize) {
        let _ = (total_pages, converted);
    }
}

/// A no-op implementation, used when no callback is attached.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared handle the pipeline stores.
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
