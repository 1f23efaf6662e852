use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, Backend};
use crate::events::{UiEmitter, UiEvent};
use crate::polling::{self, RunningLoop};
use crate::session::{SessionLink, SessionToken};
use crate::{log_debug, log_info, log_warn};

use super::alert::{self, AlertPlayer, AlertSound, AlertTrigger};
use super::snapshot::{DetectionSnapshot, DisplayFilter, LiveView};

const ENABLE_LOGS: bool = true;

/// Everything the state loop captures when it is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveLoopKey {
    pub token: SessionToken,
    pub interval: Duration,
    pub overlays: bool,
    pub sound: AlertSound,
}

struct LiveState {
    generation: u64,
    snapshot: DetectionSnapshot,
    trigger: AlertTrigger,
    filter: DisplayFilter,
    updated_at: Option<DateTime<Utc>>,
}

impl LiveState {
    fn view(&self) -> LiveView {
        self.snapshot.view(&self.filter, self.updated_at)
    }
}

/// Read side of the live feed plus the collaborators the loop needs.
#[derive(Clone)]
pub struct LiveFeed {
    state: Arc<Mutex<LiveState>>,
    backend: Arc<dyn Backend>,
    session: SessionLink,
    alerts: Arc<dyn AlertPlayer>,
    emitter: Arc<dyn UiEmitter>,
}

impl LiveFeed {
    pub async fn snapshot(&self) -> DetectionSnapshot {
        self.state.lock().await.snapshot.clone()
    }

    pub async fn view(&self) -> LiveView {
        self.state.lock().await.view()
    }

    /// Threshold/overlay display changes do not need a new loop.
    pub async fn set_filter(&self, filter: DisplayFilter) {
        let view = {
            let mut state = self.state.lock().await;
            if state.filter == filter {
                return;
            }
            state.filter = filter;
            state.view()
        };
        self.emitter.emit(UiEvent::Live(view));
    }

    /// Applies a tick result if `generation` is still the mounted one.
    /// Returns `false` when the caller belongs to a torn-down mount.
    async fn apply(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        sound: AlertSound,
        snapshot: DetectionSnapshot,
    ) -> bool {
        let (view, count, rising) = {
            let mut state = self.state.lock().await;
            if state.generation != generation || cancel.is_cancelled() {
                return false;
            }
            let count = snapshot.human_count;
            let rising = state.trigger.observe(count);
            state.snapshot = snapshot;
            state.updated_at = Some(Utc::now());
            (state.view(), count, rising)
        };

        // Presence counts as activity so an intrusion never hides behind the lock.
        if count > 0 {
            self.session.record_activity().await;
        }

        if rising {
            log_info!("presence detected ({count}); raising {sound:?} alert");
            let raised = alert::raise(self.alerts.as_ref(), sound, count);
            self.emitter.emit(UiEvent::Alert(raised));
        }

        self.emitter.emit(UiEvent::Live(view));
        true
    }
}

/// Periodic `GET /api/state` loop.
///
/// Failures other than 401 drop the tick and keep the last snapshot.
pub struct LivePoller {
    feed: LiveFeed,
    running: Option<RunningLoop<LiveLoopKey>>,
}

impl LivePoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: SessionLink,
        alerts: Arc<dyn AlertPlayer>,
        emitter: Arc<dyn UiEmitter>,
        filter: DisplayFilter,
    ) -> Self {
        Self {
            feed: LiveFeed {
                state: Arc::new(Mutex::new(LiveState {
                    generation: 0,
                    snapshot: DetectionSnapshot::default(),
                    trigger: AlertTrigger::new(),
                    filter,
                    updated_at: None,
                })),
                backend,
                session,
                alerts,
                emitter,
            },
            running: None,
        }
    }

    pub fn feed(&self) -> LiveFeed {
        self.feed.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Mounts the loop for `key`, or unmounts it for `None`. A no-op when the
    /// live loop already serves the same key.
    pub async fn ensure(&mut self, key: Option<LiveLoopKey>) {
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
            // Results from the old mount are stale from here on.
            self.feed.state.lock().await.generation += 1;
        }
    }

    async fn start(&mut self, key: LiveLoopKey) {
        let generation = {
            let mut state = self.feed.state.lock().await;
            state.generation += 1;
            state.generation
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(live_loop(
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

async fn live_loop(feed: LiveFeed, key: LiveLoopKey, generation: u64, cancel: CancellationToken) {
    log_info!(
        "live poller started (every {} ms, overlays={})",
        key.interval.as_millis(),
        key.overlays
    );
    let mut ticker = polling::ticker(key.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = feed.backend.fetch_state(&key.token, key.overlays) => result,
        };

        if feed.session.current_token().as_ref() != Some(&key.token) {
            break;
        }

        match result {
            Ok(response) => {
                let snapshot = DetectionSnapshot::from(response);
                if !feed.apply(generation, &cancel, key.sound, snapshot).await {
                    break;
                }
            }
            Err(ApiError::Unauthorized { .. }) => {
                log_warn!("state poll unauthorized; ending session");
                feed.session.invalidate().await;
                break;
            }
            Err(err) => log_debug!("state tick dropped: {err}"),
        }
    }

    log_info!("live poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StateResponse;
    use crate::testing::{signed_in_session, MockBackend, RecordingEmitter, RecordingPlayer};
    use tokio::time;

    const TICK: Duration = Duration::from_millis(250);

    struct Fixture {
        backend: Arc<MockBackend>,
        player: Arc<RecordingPlayer>,
        emitter: Arc<RecordingEmitter>,
        session: crate::session::SessionController,
        poller: LivePoller,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MockBackend::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let player = Arc::new(RecordingPlayer::default());
        let session = signed_in_session(backend.clone(), emitter.clone()).await;
        let poller = LivePoller::new(
            backend.clone(),
            session.link(),
            player.clone(),
            emitter.clone(),
            DisplayFilter::default(),
        );
        Fixture {
            backend,
            player,
            emitter,
            session,
            poller,
        }
    }

    fn key(session: &crate::session::SessionController) -> LiveLoopKey {
        LiveLoopKey {
            token: session.current_token().expect("signed in"),
            interval: TICK,
            overlays: true,
            sound: AlertSound::Beep,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_exactly_once_per_rising_edge() {
        let mut f = fixture().await;
        for count in [0, 0, 3, 3, 0, 2] {
            f.backend.push_state(Ok(StateResponse::with_count(count)));
        }

        f.poller.ensure(Some(key(&f.session))).await;
        // First tick is immediate; five more ticks drain the script.
        time::sleep(TICK * 5 + Duration::from_millis(10)).await;
        f.poller.stop().await;

        assert_eq!(f.backend.state_calls(), 6);
        assert_eq!(f.player.played(), vec![AlertSound::Beep, AlertSound::Beep]);
        assert_eq!(f.emitter.alert_counts(), vec![3, 2]);
        assert_eq!(f.poller.feed().snapshot().await.human_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_keeps_previous_snapshot() {
        let mut f = fixture().await;
        f.backend.push_state(Ok(StateResponse::with_count(4)));
        f.backend
            .push_state(Err(ApiError::Unreachable("reset by peer".into())));
        f.backend
            .push_state(Err(ApiError::InvalidBody("expected object".into())));

        f.poller.ensure(Some(key(&f.session))).await;
        time::sleep(TICK * 2 + Duration::from_millis(10)).await;

        assert_eq!(f.backend.state_calls(), 3);
        assert_eq!(f.poller.feed().snapshot().await.human_count, 4);
        assert!(f.session.current_token().is_some());
        f.poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_ends_session_and_halts_loop() {
        let mut f = fixture().await;
        f.backend.push_state(Ok(StateResponse::with_count(0)));
        f.backend.push_state(Err(ApiError::unauthorized()));

        f.poller.ensure(Some(key(&f.session))).await;
        time::sleep(TICK + Duration::from_millis(10)).await;

        assert!(f.session.current_token().is_none());
        let calls = f.backend.state_calls();
        assert_eq!(calls, 2);

        time::sleep(TICK * 8).await;
        assert_eq!(f.backend.state_calls(), calls);
        assert!(!f.poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn presence_counts_as_activity() {
        let mut f = fixture().await;
        f.session.start_auto_lock().await;
        // Every tick reports one person for the whole idle window.
        f.backend.set_state_fallback(StateResponse::with_count(1));

        f.poller.ensure(Some(key(&f.session))).await;
        time::sleep(Duration::from_secs(45)).await;

        assert!(f.session.current_token().is_some());
        f.poller.stop().await;
        f.session.stop_auto_lock().await;
    }

    #[tokio::test(start_paused = true)]
    async fn result_arriving_after_stop_is_discarded() {
        let mut f = fixture().await;
        f.backend.set_state_delay(Duration::from_millis(400));
        f.backend.push_state(Ok(StateResponse::with_count(5)));

        f.poller.ensure(Some(key(&f.session))).await;
        time::sleep(Duration::from_millis(100)).await;
        f.poller.stop().await;
        time::sleep(Duration::from_millis(600)).await;

        assert_eq!(f.backend.state_calls(), 1);
        assert_eq!(f.poller.feed().snapshot().await.human_count, 0);
        assert!(f.player.played().is_empty());
        assert!(f.emitter.live_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_keeps_loop_and_new_key_restarts_it() {
        let mut f = fixture().await;
        let first = key(&f.session);
        f.poller.ensure(Some(first.clone())).await;
        let generation = f.poller.feed.state.lock().await.generation;

        f.poller.ensure(Some(first.clone())).await;
        assert_eq!(f.poller.feed.state.lock().await.generation, generation);

        let faster = LiveLoopKey {
            interval: Duration::from_millis(100),
            ..first
        };
        f.poller.ensure(Some(faster)).await;
        assert!(f.poller.feed.state.lock().await.generation > generation);
        assert!(f.poller.is_running());

        f.poller.ensure(None).await;
        time::sleep(TICK).await;
        assert!(!f.poller.is_running());
    }
}
