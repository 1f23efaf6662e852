use std::sync::{Arc, Weak};

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::api::Backend;
use crate::drive::{CommandDispatcher, DriveCommand, DriveError, DriveKey};
use crate::events::UiEmitter;
use crate::history::{HistoryError, HistoryFeed, HistoryLoopKey, HistoryPoller};
use crate::live::{AlertPlayer, LiveFeed, LiveLoopKey, LivePoller};
use crate::password::{PasswordChangeForm, PasswordError, PasswordFlow};
use crate::session::{AuthError, SessionController, SessionView};
use crate::settings::{DashboardSettings, SettingsStore};
use crate::utils::redact_token;
use crate::{log_debug, log_info, log_warn};

use super::view::{DashboardView, Selection, Tab};
use super::ScreenControl;

const ENABLE_LOGS: bool = true;

/// Collaborators the dashboard is built from.
pub struct DashboardDeps {
    pub backend: Arc<dyn Backend>,
    pub emitter: Arc<dyn UiEmitter>,
    pub alerts: Arc<dyn AlertPlayer>,
    pub screen: Arc<dyn ScreenControl>,
    pub settings: SettingsStore,
}

struct Loops {
    live: LivePoller,
    history: HistoryPoller,
}

struct DashboardInner {
    backend: Arc<dyn Backend>,
    screen: Arc<dyn ScreenControl>,
    settings: SettingsStore,
    session: SessionController,
    selection: Mutex<Selection>,
    loops: Mutex<Loops>,
    live: LiveFeed,
    history: HistoryFeed,
    drive: CommandDispatcher,
    password: PasswordFlow,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// The operator console.
///
/// Every mutation that can change which loops should run ends with
/// [`Dashboard::reconcile`]; a supervisor task does the same whenever the
/// session token changes underneath (auto-lock, 401).
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

impl Dashboard {
    /// Must be called inside a Tokio runtime.
    pub fn new(deps: DashboardDeps) -> Self {
        let DashboardDeps {
            backend,
            emitter,
            alerts,
            screen,
            settings,
        } = deps;

        let session = SessionController::new(Arc::clone(&backend), Arc::clone(&emitter));
        let current = settings.get();

        let live = LivePoller::new(
            Arc::clone(&backend),
            session.link(),
            alerts,
            Arc::clone(&emitter),
            current.display_filter(),
        );
        let history = HistoryPoller::new(Arc::clone(&backend), session.link(), Arc::clone(&emitter));
        let drive = CommandDispatcher::new(Arc::clone(&backend), session.link(), emitter);
        let password = PasswordFlow::new(Arc::clone(&backend), session.link());

        Self {
            inner: Arc::new(DashboardInner {
                backend,
                screen,
                settings,
                live: live.feed(),
                history: history.feed(),
                loops: Mutex::new(Loops { live, history }),
                session,
                selection: Mutex::new(Selection::default()),
                drive,
                password,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Starts the idle clock and the token supervisor.
    pub async fn start(&self) {
        self.inner.session.start_auto_lock().await;

        let mut supervisor = self.inner.supervisor.lock().await;
        if let Some(handle) = supervisor.take() {
            handle.abort();
        }

        let weak: Weak<DashboardInner> = Arc::downgrade(&self.inner);
        let mut token_rx = self.inner.session.subscribe();
        *supervisor = Some(tokio::spawn(async move {
            while token_rx.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Dashboard { inner }.reconcile().await;
            }
            log_debug!("dashboard supervisor exited");
        }));
        drop(supervisor);

        self.reconcile().await;
        log_info!("dashboard started");
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.supervisor.lock().await.take() {
            handle.abort();
        }
        self.inner.session.stop_auto_lock().await;

        let mut loops = self.inner.loops.lock().await;
        loops.live.stop().await;
        loops.history.stop().await;
        log_info!("dashboard stopped");
    }

    /// Mounts or unmounts each loop to match token, tab and settings.
    ///
    /// Inputs are read while holding the loop lock, so the last reconcile
    /// to run always acts on the current token.
    pub async fn reconcile(&self) {
        let mut loops = self.inner.loops.lock().await;
        let tab = self.inner.selection.lock().await.tab;
        let settings = self.inner.settings.get();
        let token = self.inner.session.current_token();

        let live_key = token.clone().map(|token| LiveLoopKey {
            token,
            interval: settings.refresh_interval(),
            overlays: settings.show_overlays,
            sound: settings.alert_sound,
        });
        let history_key = token
            .filter(|_| tab == Tab::History)
            .map(|token| HistoryLoopKey {
                token,
                limit: settings.history_limit,
            });

        loops.live.ensure(live_key).await;
        loops.history.ensure(history_key).await;
    }

    pub async fn is_live_polling(&self) -> bool {
        self.inner.loops.lock().await.live.is_running()
    }

    pub async fn is_history_polling(&self) -> bool {
        self.inner.loops.lock().await.history.is_running()
    }

    // --- session ---

    pub async fn set_password_input(&self, value: String) {
        self.inner.session.set_password_input(value).await;
    }

    pub async fn login(&self, password: &str) -> Result<SessionView, AuthError> {
        let view = self.inner.session.login(password).await?;
        self.reconcile().await;
        Ok(view)
    }

    pub async fn lock(&self) {
        self.inner.session.lock().await;
        self.reconcile().await;
    }

    pub async fn logout(&self) {
        self.inner.session.logout().await;
        self.reconcile().await;
    }

    pub async fn record_activity(&self) {
        self.inner.session.record_activity().await;
    }

    // --- view selection ---

    pub async fn select_tab(&self, tab: Tab) {
        {
            let mut selection = self.inner.selection.lock().await;
            if selection.tab == tab {
                return;
            }
            selection.tab = tab;
        }
        self.reconcile().await;
    }

    pub async fn open_live_view(&self) {
        self.inner.selection.lock().await.live_view_open = true;
        if let Some(url) = self.video_stream_url() {
            log_debug!("live view opened on {}", redact_token(&url));
        }
        if self.inner.settings.get().auto_fullscreen {
            if let Err(err) = self.inner.screen.request_fullscreen() {
                log_warn!("fullscreen request failed: {err}");
            }
        }
    }

    pub async fn close_live_view(&self) {
        self.inner.selection.lock().await.live_view_open = false;
    }

    pub fn video_stream_url(&self) -> Option<String> {
        let token = self.inner.session.current_token()?;
        self.inner.backend.video_stream_url(&token)
    }

    // --- drive ---

    pub async fn set_drive_mode(&self, engaged: bool) {
        let stop_on_exit = self.inner.settings.get().stop_on_drive_exit;
        self.inner.drive.set_engaged(engaged, stop_on_exit).await;
    }

    /// DOM key-down. Non-steering keys only count as activity.
    pub async fn key_down(
        &self,
        key: &str,
        repeat: bool,
    ) -> Result<Option<DriveCommand>, DriveError> {
        self.record_activity().await;
        match DriveKey::from_dom_key(key) {
            Some(key) => self.inner.drive.key_down(key, repeat).await,
            None => Ok(None),
        }
    }

    pub async fn key_up(&self, key: &str) -> Result<Option<DriveCommand>, DriveError> {
        match DriveKey::from_dom_key(key) {
            Some(key) => self.inner.drive.key_up(key).await,
            None => Ok(None),
        }
    }

    pub async fn send_command(&self, command: DriveCommand) -> Result<(), DriveError> {
        self.inner.drive.send(command).await
    }

    pub async fn release_keys(&self) {
        self.inner.drive.release_all().await;
    }

    // --- settings, history, password ---

    pub fn settings(&self) -> DashboardSettings {
        self.inner.settings.get()
    }

    pub async fn update_settings(&self, settings: DashboardSettings) -> Result<DashboardSettings> {
        let stored = self.inner.settings.update(settings)?;
        self.inner.live.set_filter(stored.display_filter()).await;
        self.reconcile().await;
        Ok(stored)
    }

    pub async fn delete_history(&self) -> Result<(), HistoryError> {
        self.inner.history.delete_all().await
    }

    pub async fn change_password(
        &self,
        mut form: PasswordChangeForm,
    ) -> Result<&'static str, PasswordError> {
        self.inner.password.change_password(&mut form).await
    }

    pub async fn view(&self) -> DashboardView {
        let selection = *self.inner.selection.lock().await;
        DashboardView {
            session: self.inner.session.view().await,
            tab: selection.tab,
            live_view_open: selection.live_view_open,
            live: self.inner.live.view().await,
            history: self.inner.history.view().await,
            drive: self.inner.drive.view().await,
            settings: self.inner.settings.get(),
            video_url: self.video_stream_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, HistoryEntry, LoginResponse, StateResponse};
    use crate::history::{HistoryLimit, HISTORY_POLL_INTERVAL};
    use crate::live::AlertSound;
    use crate::session::{SessionPhase, LOCK_TIMEOUT};
    use crate::testing::{
        MockBackend, RecordingEmitter, RecordingPlayer, RecordingScreen, TEST_TOKEN,
    };
    use std::time::Duration;
    use tokio::time;

    struct Fixture {
        backend: Arc<MockBackend>,
        player: Arc<RecordingPlayer>,
        screen: Arc<RecordingScreen>,
        dashboard: Dashboard,
    }

    async fn fixture(settings: DashboardSettings) -> Fixture {
        fixture_with_screen(settings, RecordingScreen::default()).await
    }

    async fn fixture_with_screen(settings: DashboardSettings, screen: RecordingScreen) -> Fixture {
        let backend = Arc::new(MockBackend::default());
        let player = Arc::new(RecordingPlayer::default());
        let screen = Arc::new(screen);
        let dashboard = Dashboard::new(DashboardDeps {
            backend: backend.clone(),
            emitter: Arc::new(RecordingEmitter::default()),
            alerts: player.clone(),
            screen: screen.clone(),
            settings: SettingsStore::in_memory(settings),
        });
        dashboard.start().await;
        Fixture {
            backend,
            player,
            screen,
            dashboard,
        }
    }

    async fn sign_in(f: &Fixture) {
        f.backend.push_login(Ok(LoginResponse {
            token: Some(TEST_TOKEN.into()),
        }));
        f.dashboard.login("pw").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_polls_before_sign_in() {
        let f = fixture(DashboardSettings::default()).await;
        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(f.backend.state_calls(), 0);
        assert!(!f.dashboard.is_live_polling().await);
        assert_eq!(f.dashboard.video_stream_url(), None);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sign_in_starts_state_polling_at_configured_rate() {
        let f = fixture(DashboardSettings {
            refresh_rate_ms: 500,
            ..DashboardSettings::default()
        })
        .await;
        sign_in(&f).await;

        time::sleep(Duration::from_millis(1010)).await;
        assert_eq!(f.backend.state_calls(), 3);
        assert!(f.dashboard.video_stream_url().is_some());
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn history_polls_only_on_history_tab() {
        let f = fixture(DashboardSettings {
            history_limit: HistoryLimit::L100,
            ..DashboardSettings::default()
        })
        .await;
        f.backend.set_history(vec![HistoryEntry { ts: 10.0, count: 1 }]);
        sign_in(&f).await;
        time::sleep(Duration::from_millis(10)).await;
        assert!(f.backend.history_limits().is_empty());

        f.dashboard.select_tab(Tab::History).await;
        time::sleep(HISTORY_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(f.backend.history_limits(), vec![100, 100]);
        assert_eq!(f.dashboard.view().await.history.total_entries, 1);

        f.dashboard.select_tab(Tab::Settings).await;
        time::sleep(HISTORY_POLL_INTERVAL * 3).await;
        assert_eq!(f.backend.history_limits().len(), 2);
        assert!(!f.dashboard.is_history_polling().await);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_lock_stops_every_loop() {
        let f = fixture(DashboardSettings::default()).await;
        sign_in(&f).await;
        f.dashboard.select_tab(Tab::History).await;

        time::sleep(LOCK_TIMEOUT + Duration::from_secs(1)).await;
        let view = f.dashboard.view().await;
        assert_eq!(view.session.phase, SessionPhase::Locked);

        let state_calls = f.backend.state_calls();
        let history_calls = f.backend.history_limits().len();
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.backend.state_calls(), state_calls);
        assert_eq!(f.backend.history_limits().len(), history_calls);
        assert!(!f.dashboard.is_live_polling().await);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_state_poll_tears_down_history_loop_too() {
        let f = fixture(DashboardSettings::default()).await;
        f.backend.push_state(Err(ApiError::unauthorized()));
        sign_in(&f).await;
        f.dashboard.select_tab(Tab::History).await;

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            f.dashboard.view().await.session.phase,
            SessionPhase::SignedOut
        );
        assert!(!f.dashboard.is_history_polling().await);

        let history_calls = f.backend.history_limits().len();
        time::sleep(HISTORY_POLL_INTERVAL * 2).await;
        assert_eq!(f.backend.history_limits().len(), history_calls);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn presence_alert_uses_configured_sound() {
        let f = fixture(DashboardSettings {
            alert_sound: AlertSound::VoiceAlert,
            ..DashboardSettings::default()
        })
        .await;
        f.backend.push_state(Ok(StateResponse::with_count(0)));
        f.backend.push_state(Ok(StateResponse::with_count(2)));
        sign_in(&f).await;

        time::sleep(Duration::from_millis(260)).await;
        assert_eq!(f.player.played(), vec![AlertSound::VoiceAlert]);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settings_change_restarts_live_loop() {
        let f = fixture(DashboardSettings::default()).await;
        sign_in(&f).await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.backend.state_calls(), 1);

        let slower = DashboardSettings {
            refresh_rate_ms: 2000,
            ..f.dashboard.settings()
        };
        f.dashboard.update_settings(slower).await.unwrap();
        // Fresh mount ticks immediately, then every two seconds.
        time::sleep(Duration::from_millis(1990)).await;
        assert_eq!(f.backend.state_calls(), 2);
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.backend.state_calls(), 3);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn live_view_requests_fullscreen_only_when_enabled() {
        let f = fixture(DashboardSettings::default()).await;
        f.dashboard.open_live_view().await;
        assert_eq!(f.screen.requests(), 0);
        assert!(f.dashboard.view().await.live_view_open);

        f.dashboard
            .update_settings(DashboardSettings {
                auto_fullscreen: true,
                ..DashboardSettings::default()
            })
            .await
            .unwrap();
        f.dashboard.close_live_view().await;
        f.dashboard.open_live_view().await;
        assert_eq!(f.screen.requests(), 1);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fullscreen_failure_is_swallowed() {
        let f = fixture_with_screen(
            DashboardSettings {
                auto_fullscreen: true,
                ..DashboardSettings::default()
            },
            RecordingScreen::failing(),
        )
        .await;
        sign_in(&f).await;

        f.dashboard.open_live_view().await;
        assert_eq!(f.screen.requests(), 1);
        let view = f.dashboard.view().await;
        assert!(view.live_view_open);
        assert!(view.video_url.is_some());
        f.dashboard.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_reconciles_settle_on_current_token() {
        let f = fixture(DashboardSettings::default()).await;

        for _ in 0..20 {
            sign_in(&f).await;
            let racers: Vec<_> = (0..8)
                .map(|_| {
                    let dashboard = f.dashboard.clone();
                    tokio::spawn(async move { dashboard.reconcile().await })
                })
                .collect();
            f.dashboard.logout().await;
            for racer in racers {
                racer.await.unwrap();
            }

            assert!(!f.dashboard.is_live_polling().await);
            assert!(!f.dashboard.is_history_polling().await);
        }
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keys_drive_the_rover_in_drive_mode() {
        let f = fixture(DashboardSettings::default()).await;
        sign_in(&f).await;
        f.dashboard.set_drive_mode(true).await;

        f.dashboard.key_down("ArrowUp", false).await.unwrap();
        f.dashboard.key_down("ArrowUp", true).await.unwrap();
        f.dashboard.key_down("a", false).await.unwrap();
        f.dashboard.key_up("ArrowUp").await.unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            f.backend.commands(),
            vec![DriveCommand::Forward, DriveCommand::Stop]
        );
        let view = f.dashboard.view().await;
        assert!(view.drive.engaged);
        assert_eq!(view.drive.log.len(), 2);
        f.dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn password_change_goes_through_session() {
        let f = fixture(DashboardSettings::default()).await;
        let form = PasswordChangeForm {
            current_password: "a".into(),
            new_password: "bcde".into(),
            confirm_password: "bcde".into(),
        };
        assert_eq!(
            f.dashboard.change_password(form.clone()).await,
            Err(PasswordError::NotSignedIn)
        );

        sign_in(&f).await;
        assert_eq!(
            f.dashboard.change_password(form).await,
            Ok("Password changed successfully.")
        );
        assert_eq!(f.backend.password_changes(), 1);
        f.dashboard.shutdown().await;
    }
}
