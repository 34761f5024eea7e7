use std::sync::Mutex;

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{sleep, Duration},
};
use tracing::{debug, warn};

/// Restartable single-shot countdown.
pub struct IdleGuard {
    timeout: Option<Duration>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl IdleGuard {
    /// `None` or a zero timeout disables the guard.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.filter(|t| !t.is_zero()),
            pending: Mutex::new(None),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(Some(Duration::from_secs(seconds)))
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// Replaces any running countdown with a fresh one that calls
    /// `on_expiry` when it runs out. Outside a tokio runtime the countdown
    /// is skipped and the guard stays disarmed.
    pub fn arm<F>(&self, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let Some(timeout) = self.timeout else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime, idle guard not armed");
            return;
        };
        let handle = runtime.spawn(async move {
            sleep(timeout).await;
            debug!("Idle guard expired after {:?}", timeout);
            on_expiry();
        });
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(handle);
        }
    }

    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
