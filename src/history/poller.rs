use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, Backend, HistoryEntry};
use crate::events::{UiEmitter, UiEvent};
use crate::polling::{self, RunningLoop};
use crate::session::{SessionLink, SessionToken};
use crate::{log_debug, log_info, log_warn};

use super::{HistoryError, HistoryLimit, HistoryView};

const ENABLE_LOGS: bool = true;

pub const HISTORY_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLoopKey {
    pub token: SessionToken,
    pub limit: HistoryLimit,
}

#[derive(Default)]
struct HistoryState {
    generation: u64,
    /// Bumped by every delete so a fetch that started earlier cannot
    /// resurrect the cleared rows.
    deletions: u64,
    entries: Vec<HistoryEntry>,
    loading: bool,
}

impl HistoryState {
    fn view(&self) -> HistoryView {
        HistoryView::new(self.entries.clone(), self.loading)
    }
}

#[derive(Clone)]
pub struct HistoryFeed {
    state: Arc<Mutex<HistoryState>>,
    backend: Arc<dyn Backend>,
    session: SessionLink,
    emitter: Arc<dyn UiEmitter>,
}

impl HistoryFeed {
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn view(&self) -> HistoryView {
        self.state.lock().await.view()
    }

    /// Clears the local list, then asks the server to drop every record.
    /// Failures are not rolled back.
    pub async fn delete_all(&self) -> Result<(), HistoryError> {
        let token = self.session.current_token().ok_or(HistoryError::NotSignedIn)?;

        let view = {
            let mut state = self.state.lock().await;
            state.deletions += 1;
            state.entries.clear();
            state.view()
        };
        self.emitter.emit(UiEvent::History(view));

        match self.backend.delete_history(&token).await {
            Ok(()) => {
                log_info!("detection history deleted");
                Ok(())
            }
            Err(err @ ApiError::Unauthorized { .. }) => {
                log_warn!("history delete unauthorized; ending session");
                self.session.invalidate().await;
                Err(err.into())
            }
            Err(err) => {
                log_warn!("history delete failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Marks a fetch as in flight. Returns the delete counter it started
    /// under, or `None` when `generation` is stale.
    async fn begin(&self, generation: u64, cancel: &CancellationToken) -> Option<u64> {
        let (deletions, view) = {
            let mut state = self.state.lock().await;
            if state.generation != generation || cancel.is_cancelled() {
                return None;
            }
            let view = if state.loading {
                None
            } else {
                state.loading = true;
                Some(state.view())
            };
            (state.deletions, view)
        };
        if let Some(view) = view {
            self.emitter.emit(UiEvent::History(view));
        }
        Some(deletions)
    }

    async fn apply(
        &self,
        generation: u64,
        deletions: u64,
        cancel: &CancellationToken,
        entries: Vec<HistoryEntry>,
    ) -> bool {
        let view = {
            let mut state = self.state.lock().await;
            if state.generation != generation || cancel.is_cancelled() {
                return false;
            }
            if state.deletions == deletions {
                state.entries = entries;
            }
            state.loading = false;
            state.view()
        };
        self.emitter.emit(UiEvent::History(view));
        true
    }
}

/// Periodic `GET /api/history` loop, mounted only while the history tab is
/// shown. Failures other than 401 empty the local list.
pub struct HistoryPoller {
    feed: HistoryFeed,
    running: Option<RunningLoop<HistoryLoopKey>>,
}

impl HistoryPoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: SessionLink,
        emitter: Arc<dyn UiEmitter>,
    ) -> Self {
        Self {
            feed: HistoryFeed {
                state: Arc::new(Mutex::new(HistoryState::default())),
                backend,
                session,
                emitter,
            },
            running: None,
        }
    }

    pub fn feed(&self) -> HistoryFeed {
        self.feed.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn ensure(&mut self, key: Option<HistoryLoopKey>) {
        if let (Some(running), Some(key)) = (&self.running, &key) {
            if running.serves(key) {
                return;
            }
        }

        self.stop().await;
        if let Some(key) = key {
            self.start(key).await;
        }
    }

    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel();
            let mut state = self.feed.state.lock().await;
            state.generation += 1;
            state.loading = false;
        }
    }

    async fn start(&mut self, key: HistoryLoopKey) {
        let generation = {
            let mut state = self.feed.state.lock().await;
            state.generation += 1;
            state.generation
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(history_loop(
            self.feed.clone(),
            key.clone(),
            generation,
            cancel.clone(),
        ));

        self.running = Some(RunningLoop {
            key,
            cancel,
            handle,
        });
    }
}

async fn history_loop(
    feed: HistoryFeed,
    key: HistoryLoopKey,
    generation: u64,
    cancel: CancellationToken,
) {
    log_info!("history poller started (limit {})", key.limit);
    let mut ticker = polling::ticker(HISTORY_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(deletions) = feed.begin(generation, &cancel).await else {
            break;
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = feed.backend.fetch_history(&key.token, key.limit.rows()) => result,
        };

        if feed.session.current_token().as_ref() != Some(&key.token) {
            break;
        }

        let entries = match result {
            Ok(entries) => entries,
            Err(ApiError::Unauthorized { .. }) => {
                log_warn!("history poll unauthorized; ending session");
                feed.session.invalidate().await;
                break;
            }
            Err(err) => {
                log_debug!("history fetch failed, clearing list: {err}");
                Vec::new()
            }
        };

        if !feed.apply(generation, deletions, &cancel, entries).await {
            break;
        }
    }

    log_info!("history poller stopped");
}
