use thiserror::Error;

use crate::browser::{BrowserError, TabId};
use crate::service_client::ServiceError;

/// Why a capture did not complete, one variant per pipeline stage.
///
/// These never reach the user. The controller logs them and reports only
/// that the capture did not complete.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Could not resolve the active tab: {0}")]
    TabUnavailable(BrowserError),

    #[error("Script injection failed: {0}")]
    Injection(BrowserError),

    #[error("Injection into tab {0} returned no frames")]
    NoFrames(TabId),

    #[error("Extraction service error: {0}")]
    Extraction(ServiceError),

    #[error("Persistence service error: {0}")]
    Persistence(ServiceError),
}

impl CaptureError {
    /// Short stage label for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            CaptureError::TabUnavailable(_) => "tab",
            CaptureError::Injection(_) | CaptureError::NoFrames(_) => "injection",
            CaptureError::Extraction(_) => "extraction",
            CaptureError::Persistence(_) => "persistence",
        }
    }
}
