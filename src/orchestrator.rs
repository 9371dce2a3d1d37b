//! One job, end to end: download, render, convert, upload, report.
//!
//! This is the only layer that talks to storage and the status channel.
//! Page-level failures never reach it; everything that does reach it is
//! fatal for the job.

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::inference::InferenceClient;
use crate::job::{JobStatus, ParseJob};
use crate::output::{JobReport, PipelineStats};
use crate::pipeline::{DocumentPipeline, DocumentRenderer};
use crate::progress::ProgressCallback;
use crate::status::StatusReporter;
use crate::storage::ObjectStore;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{error, info, instrument};

/// Name of the downloaded source inside the job workspace.
const SOURCE_FILE_NAME: &str = "source.pdf";

/// Runs parse jobs against a fixed set of collaborators.
///
/// Holds no per-job state, so one orchestrator can run any number of jobs,
/// one after another or concurrently.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn ObjectStore>,
    renderer: Arc<dyn DocumentRenderer>,
    reporter: Arc<dyn StatusReporter>,
    pipeline: DocumentPipeline,
    config: WorkerConfig,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        renderer: Arc<dyn DocumentRenderer>,
        client: Arc<dyn InferenceClient>,
        reporter: Arc<dyn StatusReporter>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pipeline: DocumentPipeline::from_config(client, &config),
            store,
            renderer,
            reporter,
            config,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.pipeline = self.pipeline.with_progress(progress);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run `job` and record its terminal status.
    ///
    /// Every job ends with exactly one status update, `completed` or
    /// `errored: <msg>`, and errors are returned after being reported. A job
    /// that fails validation is reported as errored before any storage I/O.
    #[instrument(skip(self, job), fields(job_id = %job.job_id))]
    pub async fn run(&self, job: &ParseJob) -> Result<JobReport, WorkerError> {
        let outcome = match job.validate() {
            Ok(()) => self.execute(job).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                info!(
                    "Job complete: {} pages, {} bytes -> {}/{} in {} ms",
                    report.stats.pages_converted,
                    report.output_bytes,
                    self.config.jobs_bucket,
                    report.output_key,
                    report.duration_ms
                );
                self.reporter
                    .update_status(&job.job_id, &JobStatus::Completed)
                    .await;
                Ok(report)
            }
            Err(e) => {
                error!("Job failed: {}", e);
                self.reporter
                    .update_status(&job.job_id, &JobStatus::Errored(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &ParseJob) -> Result<JobReport, WorkerError> {
        let started = Instant::now();

        // Dropped on every return path, taking the downloaded file with it.
        let workspace = tempfile::tempdir()
            .map_err(|e| WorkerError::Internal(format!("Cannot create job workspace: {e}")))?;

        let bytes = self
            .store
            .download(&self.config.uploads_bucket, &job.source_file)
            .await?;

        let source_path = workspace.path().join(SOURCE_FILE_NAME);
        tokio::fs::write(&source_path, &bytes)
            .await
            .map_err(|e| WorkerError::Internal(format!("Cannot write job workspace: {e}")))?;

        let (markdown, stats) =
            convert_pdf(self.renderer.as_ref(), &self.pipeline, &source_path).await?;

        let output_key = job.output_key();
        let output_bytes = markdown.len();
        self.store
            .upload(&self.config.jobs_bucket, &output_key, markdown.into_bytes())
            .await?;

        Ok(JobReport {
            job_id: job.job_id.clone(),
            output_key,
            output_bytes,
            stats,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Convert the PDF at `path` into one Markdown document.
///
/// Emitted pages are joined with a single `\n`, in emission order. A
/// document where every page failed converts to the empty string.
pub async fn convert_pdf(
    renderer: &dyn DocumentRenderer,
    pipeline: &DocumentPipeline,
    path: &Path,
) -> Result<(String, PipelineStats), WorkerError> {
    check_pdf_magic(path).await?;

    let pages = renderer.render(path).await?;
    info!("Rendered {} pages from {}", pages.len(), path.display());

    let mut stream = pipeline.produce(pages);
    let mut contents = Vec::new();
    while let Some(page) = stream.next().await {
        contents.push(page.content);
    }

    Ok((contents.join("\n"), stream.stats()))
}

/// pdfium aborts on some non-PDF inputs instead of returning an error.
async fn check_pdf_magic(path: &Path) -> Result<(), WorkerError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| WorkerError::Internal(format!("Cannot open {}: {e}", path.display())))?;

    let mut magic = Vec::with_capacity(4);
    (&mut file)
        .take(4)
        .read_to_end(&mut magic)
        .await
        .map_err(|e| WorkerError::Internal(format!("Cannot read {}: {e}", path.display())))?;

    if magic != b"%PDF" {
        return Err(WorkerError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn magic_check_accepts_pdf_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        tokio::fs::write(&path, b"%PDF-1.7\n...").await.unwrap();
        assert!(check_pdf_magic(&path).await.is_ok());
    }

    #[tokio::test]
    async fn magic_check_rejects_short_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();

        let html = dir.path().join("page.html");
        tokio::fs::write(&html, b"<html>").await.unwrap();
        match check_pdf_magic(&html).await {
            Err(WorkerError::NotAPdf { magic, .. }) => assert_eq!(magic, b"<htm"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }

        let short = dir.path().join("short");
        tokio::fs::write(&short, b"%P").await.unwrap();
        assert!(matches!(
            check_pdf_magic(&short).await,
            Err(WorkerError::NotAPdf { .. })
        ));
    }
}
