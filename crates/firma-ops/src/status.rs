use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use firma_types::{
    config::StatusConfig,
    status::{Notice, StatusEvent},
};
use futures::{stream::BoxStream, StreamExt};
use tokio::{
    sync::broadcast,
    time::{Duration, Instant},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

#[derive(Default)]
struct BoardState {
    history: VecDeque<StatusEvent>,
    toast: Option<(String, Instant)>,
    badge: String,
}

/// Single-line status channel: every notice is broadcast to subscribers,
/// kept in a bounded history and shown as a toast that dismisses itself.
#[derive(Clone)]
pub struct StatusBoard {
    tx: broadcast::Sender<StatusEvent>,
    state: Arc<Mutex<BoardState>>,
    toast_for: Duration,
    capacity: usize,
}

impl StatusBoard {
    pub fn new(config: &StatusConfig) -> Self {
        let capacity = config.history.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            state: Arc::new(Mutex::new(BoardState::default())),
            toast_for: Duration::from_millis(config.toast_ms),
            capacity,
        }
    }

    pub fn publish(&self, notice: Notice) -> StatusEvent {
        let event = StatusEvent::new(notice);
        let message = event.message();
        if event.notice.is_failure() {
            warn!("Status: {message}");
        } else {
            info!("Status: {message}");
        }
        if let Ok(mut state) = self.state.lock() {
            if state.history.len() == self.capacity {
                state.history.pop_front();
            }
            state.history.push_back(event.clone());
            state.toast = Some((message, Instant::now() + self.toast_for));
        }
        let _ = self.tx.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> BoxStream<'static, StatusEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }

    /// Message currently on screen, if it has not been dismissed yet.
    pub fn toast(&self) -> Option<String> {
        let state = self.state.lock().ok()?;
        let visible = state
            .toast
            .as_ref()
            .filter(|(_, until)| Instant::now() < *until)
            .map(|(message, _)| message.clone());
        visible
    }

    pub fn history(&self) -> Vec<StatusEvent> {
        self.state
            .lock()
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.history().into_iter().map(|e| e.notice).collect()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.history.back().map(|e| e.notice.clone()))
    }

    pub fn set_badge(&self, badge: impl Into<String>) {
        let badge = badge.into();
        info!("Badge: {badge}");
        if let Ok(mut state) = self.state.lock() {
            state.badge = badge;
        }
    }

    pub fn badge(&self) -> String {
        self.state
            .lock()
            .map(|s| s.badge.clone())
            .unwrap_or_default()
    }
}
