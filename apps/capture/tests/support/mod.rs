#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use job_capture::browser::{
    BrowserError, BrowserTab, FrameResult, Probe, ScriptHost, TabAccessor, TabId,
};
use job_capture::models::{JobApplicationDraft, JobApplicationRecord, JobSubmission};
use job_capture::service_client::{JobExtractor, JobStore, ServiceError};

pub const JOB_URL: &str = "https://jobs.example.com/123";
pub const JOB_MARKUP: &str = "<html><body>Job Title: Engineer</body></html>";

/// Tab query that always answers the same way.
pub struct StubTabs(pub Option<BrowserTab>);

impl StubTabs {
    pub fn at(url: &str) -> Arc<Self> {
        Arc::new(Self(Some(BrowserTab {
            id: TabId::new("42"),
            url: url.to_string(),
        })))
    }

    pub fn none() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

#[async_trait]
impl TabAccessor for StubTabs {
    async fn current_tab(&self) -> Result<BrowserTab, BrowserError> {
        self.0.clone().ok_or(BrowserError::NoActiveTab)
    }
}

/// Script host returning canned frames. With a gate it parks inside the
/// injection call until released.
pub struct StubHost {
    frames: Vec<FrameResult>,
    calls: AtomicUsize,
    gate: Option<Gate>,
}

pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl StubHost {
    pub fn with_markup(markup: &str) -> Arc<Self> {
        Arc::new(Self::frames(vec![frame("top", json!(markup))]))
    }

    pub fn frames(frames: Vec<FrameResult>) -> Self {
        Self {
            frames,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(markup: &str) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::frames(vec![frame("top", json!(markup))])
        })
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("host is not gated")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptHost for StubHost {
    async fn inject_and_collect(
        &self,
        _tab: &TabId,
        _probe: Probe,
    ) -> Result<Vec<FrameResult>, BrowserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(self.frames.clone())
    }
}

pub fn frame(id: &str, result: Value) -> FrameResult {
    FrameResult {
        frame_id: id.to_string(),
        result,
    }
}

/// Extraction stand-in that echoes a fixed draft.
pub struct StubExtractor(pub Value);

#[async_trait]
impl JobExtractor for StubExtractor {
    async fn extract(&self, _markup: &str) -> Result<JobApplicationDraft, ServiceError> {
        JobApplicationDraft::from_value(self.0.clone())
            .ok_or_else(|| ServiceError::UnexpectedShape("not an object".into()))
    }
}

/// In-memory persistence service: assigns ids, keeps insertion order.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<JobApplicationRecord>>,
    keys: Mutex<Vec<Option<String>>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<JobApplicationRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<Option<String>> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn save(
        &self,
        submission: JobSubmission,
        idempotency_key: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut records = self.records.lock().unwrap();
        let mut fields = submission.fields().clone();
        fields.insert("id".into(), json!(format!("job-{}", records.len() + 1)));
        records.push(serde_json::from_value(Value::Object(fields))?);
        self.keys
            .lock()
            .unwrap()
            .push(idempotency_key.map(str::to_string));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<JobApplicationRecord>, ServiceError> {
        Ok(self.saved())
    }
}
