//! # pdf2md-worker
//!
//! A queue worker that turns stored PDF documents into Markdown using a
//! vision-language model.
//!
//! ## Why a VLM?
//!
//! Text-layer extractors lose reading order on multi-column layouts and
//! mangle tables. Rendering each page to an image and letting a VLM read it
//! keeps structure intact. The catch is that a table split across two pages
//! comes back as two broken halves, so every pair of neighbouring pages gets
//! a second pass that can stitch content back together.
//!
//! ## Job Overview
//!
//! ```text
//! ParseJob
//!  │
//!  ├─ 1. Download  source PDF from the uploads bucket into a temp workspace
//!  ├─ 2. Render    rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Convert   one VLM call per page, first ```markdown block kept
//!  ├─ 4. Correct   one VLM call per pair of neighbouring successful pages
//!  ├─ 5. Join      emitted pages, "\n"-separated, in page order
//!  ├─ 6. Upload    jobs/<job_id>/<job_id>.md
//!  └─ 7. Report    `completed` or `errored: <message>`
//! ```
//!
//! Pages that fail to convert are skipped; the job still completes. Storage
//! and rendering failures are fatal for the job.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2md_worker::{
//!     HttpInferenceClient, JobOrchestrator, LocalStorage, LogStatusReporter, ParseJob,
//!     PdfiumRenderer, WorkerConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::default();
//!     let client = HttpInferenceClient::new("http://localhost:8000/infer", None, 120)?;
//!     let orchestrator = JobOrchestrator::new(
//!         Arc::new(LocalStorage::new("./data")),
//!         Arc::new(PdfiumRenderer::new(config.max_rendered_pixels, None)),
//!         Arc::new(client),
//!         Arc::new(LogStatusReporter),
//!         config,
//!     );
//!
//!     let job = ParseJob::new("123", "md", "reports/q3.pdf");
//!     let report = orchestrator.run(&job).await?;
//!     println!("wrote {}", report.output_key);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-worker` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod inference;
pub mod job;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod status;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use error::{InferenceError, PageError, StorageOp, WorkerError};
pub use inference::http::HttpInferenceClient;
pub use inference::provider::ProviderInferenceClient;
pub use inference::{
    InferenceClient, InferenceMessage, InferenceMessageContent, InferenceRequest,
    InferenceResponse, Role,
};
pub use job::{JobStatus, ParseJob};
pub use orchestrator::{convert_pdf, JobOrchestrator};
pub use output::{JobReport, PageMarkdown, PipelineStats};
pub use pipeline::{
    extract_markdown_blocks, CorrectionOutcome, CorrectionResult, DocumentPipeline,
    DocumentRenderer, DocumentStream, OverlapCorrector, Page, PageConverter, PdfiumRenderer,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use status::{LogStatusReporter, StatusReporter, SupabaseStatusReporter};
pub use storage::{LocalStorage, ObjectStore, SupabaseStorage};
