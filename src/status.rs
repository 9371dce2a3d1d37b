//! Terminal status reporting for jobs.
//!
//! Reporting is best-effort: a reporter logs its own failures and never
//! fails the job it is reporting on.

use crate::error::WorkerError;
use crate::job::JobStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

/// Records the final status of a job somewhere visible to the caller.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn update_status(&self, job_id: &str, status: &JobStatus);
}

/// Writes statuses to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusReporter;

#[async_trait]
impl StatusReporter for LogStatusReporter {
    async fn update_status(&self, job_id: &str, status: &JobStatus) {
        match status {
            JobStatus::Completed => info!(job_id, "Job status: {}", status),
            JobStatus::Errored(_) => error!(job_id, "Job status: {}", status),
        }
    }
}

/// Updates the `status` column of a job row through the Supabase REST API.
#[derive(Debug, Clone)]
pub struct SupabaseStatusReporter {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    table: String,
}

impl SupabaseStatusReporter {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        table: impl Into<String>,
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
            table: table.into(),
        })
    }

    /// PATCH for the row whose `id` equals `job_id`. The id travels as an
    /// encoded query value, so any opaque id addresses exactly one row.
    fn status_request(&self, job_id: &str, status: &JobStatus) -> reqwest::RequestBuilder {
        self.client
            .patch(format!("{}/rest/v1/{}", self.base_url, self.table))
            .query(&[("id", format!("eq.{job_id}"))])
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "status": status.to_string() }))
    }
}

#[async_trait]
impl StatusReporter for SupabaseStatusReporter {
    async fn update_status(&self, job_id: &str, status: &JobStatus) {
        let result = self.status_request(job_id, status).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(job_id, "Status set to '{}'", status);
            }
            Ok(response) => {
                warn!(
                    job_id,
                    "Status update rejected with HTTP {}", response.status()
                );
            }
            Err(e) => warn!(job_id, "Status update failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request_url(job_id: &str) -> reqwest::Url {
        SupabaseStatusReporter::new("https://proj.supabase.co/", "key", "jobs", 5)
            .unwrap()
            .status_request(job_id, &JobStatus::Completed)
            .build()
            .unwrap()
            .url()
            .clone()
    }

    #[test]
    fn request_filters_on_id() {
        assert_eq!(
            request_url("42").as_str(),
            "https://proj.supabase.co/rest/v1/jobs?id=eq.42"
        );
    }

    #[test]
    fn opaque_ids_are_encoded_into_one_filter() {
        for id in ["job 42", "user@example:7", "a&status=eq.x", "50%"] {
            let url = request_url(id);
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            assert_eq!(pairs, vec![("id".to_string(), format!("eq.{id}"))]);
        }
    }

    #[tokio::test]
    async fn sends_patch_with_status_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            // Headers and the small JSON body arrive together well before this limit.
            while !String::from_utf8_lossy(&received).contains("}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });

        let reporter =
            SupabaseStatusReporter::new(format!("http://{addr}"), "secret", "jobs", 5).unwrap();
        reporter
            .update_status("7", &JobStatus::Errored("boom".into()))
            .await;

        let request = server.await.unwrap();
        assert!(request.starts_with("PATCH /rest/v1/jobs?id=eq.7 "));
        assert!(request.contains("errored: boom"));
        assert!(request.to_ascii_lowercase().contains("apikey: secret"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_does_not_panic() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter =
            SupabaseStatusReporter::new(format!("http://{addr}"), "k", "jobs", 2).unwrap();
        reporter.update_status("1", &JobStatus::Completed).await;
    }
}
