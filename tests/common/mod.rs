//! In-memory collaborators for orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pdf2md_worker::{
    DocumentRenderer, InferenceClient, InferenceError, InferenceRequest, JobStatus, ObjectStore,
    Page, StatusReporter, StorageOp, WorkerError,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type Reply = Result<Vec<String>, InferenceError>;

/// Bytes that pass the PDF magic check.
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n% fake body\n%%EOF\n";

/// A reply holding one ```markdown block per entry.
pub fn fenced(blocks: &[&str]) -> Reply {
    let body = blocks
        .iter()
        .map(|b| format!("```markdown\n{b}\n```"))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(vec![body])
}

/// A correction reply with no blocks: the originals are kept.
pub fn unchanged() -> Reply {
    Ok(vec!["No continuation found.".to_string()])
}

pub fn unavailable() -> Reply {
    Err(InferenceError::Unavailable {
        endpoint: "fake".into(),
        detail: "connection refused".into(),
    })
}

// ── Inference ────────────────────────────────────────────────────────────

/// Replays a fixed script of replies, in call order.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<usize>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn call(&self, _request: &InferenceRequest) -> Reply {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(unavailable)
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Produces `pages` blank pages for any input.
pub struct BlankRenderer {
    pub pages: usize,
}

#[async_trait]
impl DocumentRenderer for BlankRenderer {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<Page>, WorkerError> {
        assert!(pdf_path.exists(), "renderer called on a missing file");
        Ok((0..self.pages)
            .map(|index| Page {
                index,
                image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255; 4]))),
            })
            .collect())
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

/// A bucket/key map that records every call.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    downloads: Mutex<Vec<(String, String)>>,
    uploads: Mutex<Vec<(String, String)>>,
    pub fail_uploads: bool,
}

impl MemoryStore {
    pub fn with_object(bucket: &str, key: &str, bytes: &[u8]) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        store
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WorkerError> {
        self.downloads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        self.object(bucket, key).ok_or_else(|| WorkerError::Storage {
            op: StorageOp::Download,
            bucket: bucket.to_string(),
            key: key.to_string(),
            detail: "HTTP 404 Not Found".to_string(),
        })
    }

    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), WorkerError> {
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.fail_uploads {
            return Err(WorkerError::Storage {
                op: StorageOp::Upload,
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: "HTTP 507 Insufficient Storage".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

// ── Status ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<(String, JobStatus)>>,
}

impl RecordingReporter {
    pub fn statuses(&self) -> Vec<(String, JobStatus)> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn update_status(&self, job_id: &str, status: &JobStatus) {
        self.statuses
            .lock()
            .unwrap()
            .push((job_id.to_string(), status.clone()));
    }
}
