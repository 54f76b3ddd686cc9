//! Extraction service client: raw page markup in, structured draft out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::models::JobApplicationDraft;
use crate::service_client::{endpoint, ensure_success, ServiceError};

pub const PROCESS_JOB_PATH: &str = "/process-job";

/// Turns page markup into a job-application draft. The parsing itself is
/// the service's business.
#[async_trait]
pub trait JobExtractor: Send + Sync {
    async fn extract(&self, markup: &str) -> Result<JobApplicationDraft, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ProcessJobRequest<'a> {
    html: &'a str,
}

#[derive(Clone)]
pub struct ExtractionClient {
    client: Client,
    url: String,
}

impl ExtractionClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, PROCESS_JOB_PATH),
        }
    }
}

#[async_trait]
impl JobExtractor for ExtractionClient {
    async fn extract(&self, markup: &str) -> Result<JobApplicationDraft, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ProcessJobRequest { html: markup })
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        debug!(
            markup_bytes = markup.len(),
            response_bytes = body.len(),
            "Extraction succeeded"
        );

        JobApplicationDraft::from_value(value).ok_or_else(|| {
            ServiceError::UnexpectedShape("extraction response is not a JSON object".to_string())
        })
    }
}
