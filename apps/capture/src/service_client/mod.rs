/// Backend service clients. The only place the pipeline talks HTTP to the
/// extraction and persistence services.
///
/// Neither client retries. A failed call surfaces once as a `ServiceError`
/// and the capture that issued it is abandoned.
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub mod extraction;
pub mod persistence;

pub use extraction::{ExtractionClient, JobExtractor};
pub use persistence::{JobStore, PersistenceClient, IDEMPOTENCY_HEADER};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// `{"error": {"message": ...}}` or `{"message": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorMessage },
    Flat(ErrorMessage),
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Shared HTTP client for both services and the DevTools host.
pub fn build_http_client(timeout: Duration) -> Result<Client, ServiceError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Joins a configured base URL with a fixed endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Passes 2xx responses through; turns anything else into `ServiceError::Api`
/// carrying the service's own message when it sent one.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    warn!("{} returned {}: {}", url, status, body);
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat(error)) => error.message,
        Err(_) => body,
    };
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}
