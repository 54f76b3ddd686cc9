use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::browser::{BrowserError, FrameResult, Probe, ScriptHost, TabId};
use crate::errors::CaptureError;

/// Reads serialized document markup out of a tab through a `ScriptHost`.
#[derive(Clone)]
pub struct ContentExtractor {
    host: Arc<dyn ScriptHost>,
}

impl ContentExtractor {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }

    /// Markup of every frame, in host frame order.
    pub async fn extract_markup(&self, tab: &TabId) -> Result<Vec<String>, CaptureError> {
        self.collect(tab)
            .await?
            .into_iter()
            .map(markup_of)
            .collect::<Result<_, _>>()
            .map_err(CaptureError::Injection)
    }

    /// Markup of the top document only. Sub-frame results are discarded
    /// without inspection.
    pub async fn top_document(&self, tab: &TabId) -> Result<String, CaptureError> {
        let frames = self.collect(tab).await?;
        let discarded = frames.len().saturating_sub(1);
        let top = frames
            .into_iter()
            .next()
            .ok_or_else(|| CaptureError::NoFrames(tab.clone()))?;
        if discarded > 0 {
            debug!(tab = %tab, discarded, "Ignoring sub-frame documents");
        }
        markup_of(top).map_err(CaptureError::Injection)
    }

    async fn collect(&self, tab: &TabId) -> Result<Vec<FrameResult>, CaptureError> {
        self.host
            .inject_and_collect(tab, Probe::DocumentMarkup)
            .await
            .map_err(CaptureError::Injection)
    }
}

fn markup_of(frame: FrameResult) -> Result<String, BrowserError> {
    match frame.result {
        Value::String(html) => Ok(html),
        _ => Err(BrowserError::UnexpectedResult {
            frame_id: frame.frame_id,
        }),
    }
}
