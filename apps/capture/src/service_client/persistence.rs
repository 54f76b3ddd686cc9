//! Persistence service client: stores submissions and lists stored records.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::models::{JobApplicationRecord, JobSubmission};
use crate::service_client::{endpoint, ensure_success, ServiceError};

pub const SAVE_JOB_PATH: &str = "/save-job";
pub const APPLIED_JOBS_PATH: &str = "/applied-jobs";
/// Header carrying the client-derived deduplication key on save.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Durable storage for job applications.
///
/// `save` is not idempotent on its own: without a key, submitting the same
/// draft twice stores two records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(
        &self,
        submission: JobSubmission,
        idempotency_key: Option<&str>,
    ) -> Result<(), ServiceError>;

    /// All stored records in the service's own order.
    async fn list(&self) -> Result<Vec<JobApplicationRecord>, ServiceError>;
}

#[derive(Clone)]
pub struct PersistenceClient {
    client: Client,
    save_url: String,
    list_url: String,
}

impl PersistenceClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            save_url: endpoint(base_url, SAVE_JOB_PATH),
            list_url: endpoint(base_url, APPLIED_JOBS_PATH),
        }
    }
}

#[async_trait]
impl JobStore for PersistenceClient {
    async fn save(
        &self,
        submission: JobSubmission,
        idempotency_key: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut request = self.client.post(&self.save_url).json(&submission);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        ensure_success(request.send().await?).await?;
        debug!(url = submission.url(), "Job application saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<JobApplicationRecord>, ServiceError> {
        let response = self.client.get(&self.list_url).send().await?;
        let body = ensure_success(response).await?.text().await?;
        let records: Vec<JobApplicationRecord> = serde_json::from_str(&body)?;
        debug!(count = records.len(), "Fetched applied jobs");
        Ok(records)
    }
}
