use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

type CaptureListener = Arc<dyn Fn(u64) + Send + Sync>;

/// Publisher of the refresh signal.
///
/// The counter starts at zero and moves by exactly one per completed
/// capture. Consumers either register a callback with
/// `on_capture_completed` or hold a `RefreshSubscription`.
pub struct CaptureEvents {
    refresh: watch::Sender<u64>,
    listeners: Mutex<Vec<CaptureListener>>,
}

impl CaptureEvents {
    pub fn new() -> Self {
        let (refresh, _) = watch::channel(0);
        Self {
            refresh,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback invoked with the new counter value after every
    /// completed capture.
    pub fn on_capture_completed<F>(&self, listener: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn subscribe(&self) -> RefreshSubscription {
        RefreshSubscription {
            rx: self.refresh.subscribe(),
        }
    }

    pub fn current(&self) -> u64 {
        *self.refresh.borrow()
    }

    /// Single synchronous increment, then listener fan-out. Listeners run
    /// outside the lock so they may register further listeners.
    pub(crate) fn publish_completed(&self) -> u64 {
        let mut value = 0;
        self.refresh.send_modify(|counter| {
            *counter += 1;
            value = *counter;
        });

        let listeners: Vec<CaptureListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(value);
        }
        value
    }
}

impl Default for CaptureEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the refresh signal.
pub struct RefreshSubscription {
    rx: watch::Receiver<u64>,
}

impl RefreshSubscription {
    pub fn current(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Waits for the next increment. Several increments landing before the
    /// wait resumes collapse into one wake-up with the latest value. `None`
    /// once the publisher is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
