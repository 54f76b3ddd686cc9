//! Browser boundary: resolving the active tab and running a probe inside
//! its frames.
//!
//! Both operations cross into a privileged host (the browser) and are
//! modelled as traits so the capture pipeline never depends on how the host
//! is reached. `CdpBrowser` is the DevTools-protocol implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod cdp;
pub mod extractor;

pub use cdp::CdpBrowser;
pub use extractor::ContentExtractor;

/// Host-assigned tab identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    pub id: TabId,
    /// Empty when the host did not report an address.
    pub url: String,
}

/// Side-effect-free functions that can be evaluated inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Serialized rendered DOM of the frame's document.
    DocumentMarkup,
}

impl Probe {
    pub fn expression(&self) -> &'static str {
        match self {
            Probe::DocumentMarkup => "document.documentElement.outerHTML",
        }
    }
}

/// The value a probe produced in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub frame_id: String,
    pub result: Value,
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("No active tab in the focused window")]
    NoActiveTab,

    #[error("Tab {0} is no longer available")]
    TabGone(TabId),

    #[error("DevTools HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DevTools WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("DevTools {operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Probe threw in frame {frame_id}: {message}")]
    ProbeException { frame_id: String, message: String },

    #[error("Frame {frame_id} returned a non-string result")]
    UnexpectedResult { frame_id: String },
}

/// Resolves the tab that is active in the focused window.
#[async_trait]
pub trait TabAccessor: Send + Sync {
    async fn current_tab(&self) -> Result<BrowserTab, BrowserError>;
}

/// Runs a probe in every frame of a tab and returns per-frame results in the
/// host's frame order (top document first).
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn inject_and_collect(
        &self,
        tab: &TabId,
        probe: Probe,
    ) -> Result<Vec<FrameResult>, BrowserError>;
}
