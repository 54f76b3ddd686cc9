//! Applied-jobs list: refetches the full record list on mount and on every
//! refresh signal, replacing what it displayed before.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::capture::RefreshSubscription;
use crate::models::JobApplicationRecord;
use crate::service_client::JobStore;

/// What the view currently shows.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub records: Vec<JobApplicationRecord>,
    /// Successful fetches so far.
    pub renders: u64,
}

pub struct ListView {
    store: Arc<dyn JobStore>,
    state: watch::Sender<ListState>,
}

impl ListView {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let (state, _) = watch::channel(ListState::default());
        Self { store, state }
    }

    pub fn watch(&self) -> watch::Receiver<ListState> {
        self.state.subscribe()
    }

    pub fn records(&self) -> Vec<JobApplicationRecord> {
        self.state.borrow().records.clone()
    }

    /// Fetches the full list and replaces the displayed set. On failure the
    /// previous set stays on screen and `false` is returned.
    pub async fn refresh(&self) -> bool {
        match self.store.list().await {
            Ok(records) => {
                debug!(count = records.len(), "Rendering applied jobs");
                self.state.send_modify(|state| {
                    state.records = records;
                    state.renders += 1;
                });
                true
            }
            Err(e) => {
                error!("Error fetching applied jobs: {e}");
                false
            }
        }
    }

    /// Fetches once now, then again on every refresh signal until the
    /// publisher goes away.
    pub fn mount(self, mut refresh: RefreshSubscription) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.refresh().await;
            while let Some(signal) = refresh.changed().await {
                debug!(signal, "Refresh signal changed");
                self.refresh().await;
            }
        })
    }
}

/// Plain-text rendering of the list.
pub fn render(records: &[JobApplicationRecord]) -> String {
    let mut out = String::from("Applied Jobs\n");
    for record in records {
        let _ = writeln!(out, "- {}", record.title);
        let _ = writeln!(out, "  Company: {}", record.company);
        let _ = writeln!(out, "  Applied Date: {}", record.display_date());
    }
    out
}
