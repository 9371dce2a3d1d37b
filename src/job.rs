//! Job descriptions and terminal statuses.

use crate::error::WorkerError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Job ids are opaque, but they end up as one storage key segment: no path
/// separators and no control characters.
static RE_JOB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^/\\\p{Cc}]{1,256}$").unwrap());

/// One queued request to convert a stored PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseJob {
    pub job_id: String,
    /// Requested output kind, e.g. `md`. Only Markdown is produced.
    pub output_format: String,
    /// Storage key of the source PDF in the uploads bucket.
    pub source_file: String,
}

impl ParseJob {
    pub fn new(
        job_id: impl Into<String>,
        output_format: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            output_format: output_format.into(),
            source_file: source_file.into(),
        }
    }

    /// Reject payloads whose id would escape `jobs/<id>/` or whose source
    /// key is missing.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if !RE_JOB_ID.is_match(&self.job_id) || self.job_id.chars().all(|c| c == '.') {
            return Err(WorkerError::InvalidJob {
                job_id: self.job_id.clone(),
                reason: "job id must not be a path: 1-256 non-control characters, \
                         no separators, not all dots"
                    .to_string(),
            });
        }
        if self.source_file.trim().is_empty() {
            return Err(WorkerError::InvalidJob {
                job_id: self.job_id.clone(),
                reason: "source file key is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Storage key of the finished document: `jobs/<job_id>/<job_id>.md`.
    pub fn output_key(&self) -> String {
        format!("jobs/{0}/{0}.md", self.job_id)
    }
}

/// Terminal status recorded for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Errored(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Errored(message) => write!(f, "errored: {message}"),
        }
    }
}
