//! Configuration for the worker.
//!
//! All tunable behaviour lives in [`WorkerConfig`], built through
//! [`WorkerConfigBuilder`]. Connection details for the collaborators
//! (inference endpoint URL, Supabase URL and key) are not part of it: they
//! are passed straight to the client constructors, so a config can be logged
//! without leaking credentials.

use crate::error::WorkerError;
use std::path::PathBuf;

/// Configuration for a worker process.
///
/// # Example
/// ```rust
/// use pdf2md_worker::WorkerConfig;
///
/// let config = WorkerConfig::builder()
///     .max_rendered_pixels(1600)
///     .jobs_bucket("results")
///     .build()
///     .unwrap();
/// assert_eq!(config.jobs_bucket, "results");
/// ```
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Longest edge of a rendered page, in pixels. Default: 2000.
    ///
    /// Vision models downscale large images anyway; anything much above
    /// 2000 px costs memory and upload time without improving recognition.
    pub max_rendered_pixels: u32,

    /// Per-call timeout for the inference endpoint, in seconds. Default: 120.
    ///
    /// A dense page with a large table can take a self-hosted 7B model well
    /// over a minute to transcribe.
    pub inference_timeout_secs: u64,

    /// Per-request timeout for storage and status calls, in seconds. Default: 120.
    pub storage_timeout_secs: u64,

    /// Bucket source documents are downloaded from. Default: `uploads`.
    pub uploads_bucket: String,

    /// Bucket finished documents are uploaded to. Default: `jobs`.
    pub jobs_bucket: String,

    /// Table holding job rows for status updates. Default: `jobs`.
    pub status_table: String,

    /// Override for the page-to-Markdown instruction.
    pub page_prompt: Option<String>,

    /// Override for the overlap-correction instruction.
    pub correction_prompt: Option<String>,

    /// Directory holding the pdfium shared library; `None` uses the system one.
    pub pdfium_library_dir: Option<PathBuf>,

    /// Sampling temperature when a chat provider backs inference. Default: 0.1.
    pub temperature: f32,

    /// Output token cap when a chat provider backs inference. Default: 4096.
    pub max_tokens: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            inference_timeout_secs: 120,
            storage_timeout_secs: 120,
            uploads_bucket: "uploads".to_string(),
            jobs_bucket: "jobs".to_string(),
            status_table: "jobs".to_string(),
            page_prompt: None,
            correction_prompt: None,
            pdfium_library_dir: None,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl WorkerConfig {
    /// Create a new builder for `WorkerConfig`.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn inference_timeout_secs(mut self, secs: u64) -> Self {
        self.config.inference_timeout_secs = secs;
        self
    }

    pub fn storage_timeout_secs(mut self, secs: u64) -> Self {
        self.config.storage_timeout_secs = secs;
        self
    }

    pub fn uploads_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.uploads_bucket = bucket.into();
        self
    }

    pub fn jobs_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.jobs_bucket = bucket.into();
        self
    }

    pub fn status_table(mut self, table: impl Into<String>) -> Self {
        self.config.status_table = table.into();
        self
    }

    pub fn page_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.page_prompt = Some(prompt.into());
        self
    }

    pub fn correction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.correction_prompt = Some(prompt.into());
        self
    }

    pub fn pdfium_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_dir = Some(dir.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        let c = &self.config;
        if c.inference_timeout_secs == 0 || c.storage_timeout_secs == 0 {
            return Err(WorkerError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.uploads_bucket.trim().is_empty() || c.jobs_bucket.trim().is_empty() {
            return Err(WorkerError::InvalidConfig(
                "Bucket names must not be empty".into(),
            ));
        }
        if c.status_table.trim().is_empty() {
            return Err(WorkerError::InvalidConfig(
                "Status table must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(WorkerError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
