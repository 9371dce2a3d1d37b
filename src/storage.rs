//! Object storage: fetch source PDFs, store finished Markdown.
//!
//! Keys are opaque to the worker apart from one rule: they may not escape
//! their bucket. Uploads are single writes of a complete document; there is
//! no streaming or partial upload.

use crate::error::{StorageOp, WorkerError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Byte-blob storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WorkerError>;

    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), WorkerError>;
}

fn storage_error(op: StorageOp, bucket: &str, key: &str, detail: impl ToString) -> WorkerError {
    WorkerError::Storage {
        op,
        bucket: bucket.to_string(),
        key: key.to_string(),
        detail: detail.to_string(),
    }
}

fn content_type_for(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("md") => "text/markdown; charset=utf-8",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ── Supabase ─────────────────────────────────────────────────────────────

/// Supabase Storage over its REST API.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| WorkerError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket,
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WorkerError> {
        let url = self.object_url(bucket, key);
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| storage_error(StorageOp::Download, bucket, key, e))?;

        if !response.status().is_success() {
            return Err(storage_error(
                StorageOp::Download,
                bucket,
                key,
                format!("HTTP {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| storage_error(StorageOp::Download, bucket, key, e))?;

        info!("Downloaded {}/{} ({} bytes)", bucket, key, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), WorkerError> {
        let url = self.object_url(bucket, key);
        let len = bytes.len();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type_for(key))
            .body(bytes)
            .send()
            .await
            .map_err(|e| storage_error(StorageOp::Upload, bucket, key, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(storage_error(
                StorageOp::Upload,
                bucket,
                key,
                format!("HTTP {status}: {body}"),
            ));
        }

        info!("Uploaded {}/{} ({} bytes)", bucket, key, len);
        Ok(())
    }
}

// ── Local directory ──────────────────────────────────────────────────────

/// A directory tree laid out as `<root>/<bucket>/<key>`.
///
/// Handy for running the worker without a storage service, and for tests.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` under the root, refusing anything that would escape it.
    pub fn object_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let relative = Path::new(bucket).join(key.trim_start_matches('/'));
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, WorkerError> {
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| storage_error(StorageOp::Download, bucket, key, "key escapes bucket"))?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| storage_error(StorageOp::Download, bucket, key, e))?;

        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }

    /// Atomic write: write to a sibling temp file, then rename over the target.
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), WorkerError> {
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| storage_error(StorageOp::Upload, bucket, key, "key escapes bucket"))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(StorageOp::Upload, bucket, key, e))?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| storage_error(StorageOp::Upload, bucket, key, e))?;

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| storage_error(StorageOp::Upload, bucket, key, e))?;

        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
