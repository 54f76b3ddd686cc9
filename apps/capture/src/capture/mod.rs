//! Capture controller: drives one capture from tab query to saved record.
//!
//! Stages run strictly in sequence:
//! tab + markup → extraction service → persistence service → refresh signal.
//! A second trigger while a capture is in flight is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::{ContentExtractor, ScriptHost, TabAccessor};
use crate::errors::CaptureError;
use crate::service_client::{JobExtractor, JobStore};

pub mod events;
pub mod idempotency;

pub use events::{CaptureEvents, RefreshSubscription};
pub use idempotency::IdempotencyPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Idle,
    /// Resolving the tab and reading its markup.
    Capturing,
    Extracting,
    Persisting,
}

/// What a trigger did, as seen by the host UI. Failure detail is logged,
/// never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed { refresh: u64 },
    /// Another capture was in flight; nothing was done.
    Busy,
    Failed,
}

pub struct CaptureController {
    tabs: Arc<dyn TabAccessor>,
    extractor: ContentExtractor,
    extraction: Arc<dyn JobExtractor>,
    store: Arc<dyn JobStore>,
    events: Arc<CaptureEvents>,
    idempotency: IdempotencyPolicy,
    busy: AtomicBool,
    stage: watch::Sender<CaptureStage>,
}

impl CaptureController {
    pub fn new(
        tabs: Arc<dyn TabAccessor>,
        host: Arc<dyn ScriptHost>,
        extraction: Arc<dyn JobExtractor>,
        store: Arc<dyn JobStore>,
        events: Arc<CaptureEvents>,
    ) -> Self {
        let (stage, _) = watch::channel(CaptureStage::Idle);
        Self {
            tabs,
            extractor: ContentExtractor::new(host),
            extraction,
            store,
            events,
            idempotency: IdempotencyPolicy::default(),
            busy: AtomicBool::new(false),
            stage,
        }
    }

    pub fn with_idempotency(mut self, policy: IdempotencyPolicy) -> Self {
        self.idempotency = policy;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn stage(&self) -> CaptureStage {
        *self.stage.borrow()
    }

    /// Stage changes, for hosts that show a busy indicator.
    pub fn watch_stage(&self) -> watch::Receiver<CaptureStage> {
        self.stage.subscribe()
    }

    pub fn events(&self) -> &Arc<CaptureEvents> {
        &self.events
    }

    /// Handles one "save job" trigger.
    pub async fn capture(&self) -> CaptureOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy, &self.stage) else {
            warn!("Capture already in progress; ignoring trigger");
            return CaptureOutcome::Busy;
        };

        let span = info_span!("capture", capture_id = %Uuid::new_v4());
        match self.run().instrument(span.clone()).await {
            Ok(refresh) => {
                span.in_scope(|| info!(refresh, "Capture completed"));
                CaptureOutcome::Completed { refresh }
            }
            Err(e) => {
                span.in_scope(|| error!(stage = e.stage(), "Error processing job: {e}"));
                CaptureOutcome::Failed
            }
        }
    }

    async fn run(&self) -> Result<u64, CaptureError> {
        self.enter(CaptureStage::Capturing);
        let tab = self
            .tabs
            .current_tab()
            .await
            .map_err(CaptureError::TabUnavailable)?;
        let markup = self.extractor.top_document(&tab.id).await?;
        debug!(tab = %tab.id, url = %tab.url, bytes = markup.len(), "Captured page markup");

        self.enter(CaptureStage::Extracting);
        let draft = self
            .extraction
            .extract(&markup)
            .await
            .map_err(CaptureError::Extraction)?;

        let key = self.idempotency.key_for(&tab.url, &draft);
        let submission = draft.into_submission(&tab.url, Utc::now());

        self.enter(CaptureStage::Persisting);
        self.store
            .save(submission, key.as_deref())
            .await
            .map_err(CaptureError::Persistence)?;

        Ok(self.events.publish_completed())
    }

    fn enter(&self, stage: CaptureStage) {
        self.stage.send_replace(stage);
    }
}

/// Holds the busy flag for one capture. Dropping it, on any exit path,
/// clears the flag and returns the stage to `Idle`.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    stage: &'a watch::Sender<CaptureStage>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(busy: &'a AtomicBool, stage: &'a watch::Sender<CaptureStage>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy, stage })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.stage.send_replace(CaptureStage::Idle);
        self.busy.store(false, Ordering::Release);
    }
}
