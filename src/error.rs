//! Error types for the pdf2md worker.
//!
//! Three layers of failure, each with its own type:
//!
//! * [`WorkerError`]: **Fatal** for a job: the source could not be fetched,
//!   is not a PDF, could not be rendered, or the result could not be stored.
//!   The orchestrator marks the job `errored` and hands the error back to the
//!   queue layer.
//!
//! * [`PageError`]: **Non-fatal**: one page could not be converted. The
//!   document pipeline logs it, skips the page, and keeps going.
//!
//! * [`InferenceError`]: a single failed round-trip to the inference
//!   service. It never escapes the pipeline on its own: the page converter
//!   turns it into a [`PageError`], the overlap corrector into a fallback.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a job run.
#[derive(Debug, Error)]
pub enum WorkerError {
    // ── Job errors ────────────────────────────────────────────────────────
    /// The queue payload is unusable (empty or unsafe job id, empty source key).
    #[error("Invalid job '{job_id}': {reason}")]
    InvalidJob { job_id: String, reason: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Download from or upload to object storage failed.
    #[error("Storage {op} failed for '{bucket}/{key}': {detail}")]
    Storage {
        op: StorageOp,
        bucket: String,
        key: String,
        detail: String,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The downloaded bytes are not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which direction a storage call was going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Download,
    Upload,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageOp::Download => f.write_str("download"),
            StorageOp::Upload => f.write_str("upload"),
        }
    }
}

/// A non-fatal error for a single page.
///
/// The page is dropped from the output; the rest of the document continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    /// The inference call failed or the response held no markdown block.
    #[error("Page {page}: conversion failed: {detail}")]
    ConversionFailed { page: usize, detail: String },
}

/// A failed call to the inference service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// Transport-level failure: connection refused, DNS, timeout, provider error.
    #[error("Inference endpoint '{endpoint}' unavailable: {detail}")]
    Unavailable { endpoint: String, detail: String },

    /// The endpoint answered with a non-success HTTP status.
    #[error("Inference endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected `{"outputs": [...]}` shape.
    #[error("Could not decode inference response: {0}")]
    Decode(String),

    /// A request must contain at least one message.
    #[error("Inference request has no messages")]
    EmptyRequest,
}
