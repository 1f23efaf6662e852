use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::api::{ApiError, Backend};
use crate::events::{UiEmitter, UiEvent};
use crate::{log_info, log_warn};

use super::{AuthError, SessionState, SessionToken, SessionView};

const ENABLE_LOGS: bool = true;

/// How often the idle clock is evaluated. Independent of every poll cadence.
pub const LOCK_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the session token and the idle clock.
///
/// The current token is published on a watch channel; pollers subscribe via
/// [`SessionLink`] and can only ever clear it.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    token_tx: Arc<watch::Sender<Option<SessionToken>>>,
    backend: Arc<dyn Backend>,
    emitter: Arc<dyn UiEmitter>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn Backend>, emitter: Arc<dyn UiEmitter>) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(SessionState::new(Instant::now()))),
            token_tx: Arc::new(token_tx),
            backend,
            emitter,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn link(&self) -> SessionLink {
        SessionLink {
            controller: self.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionToken>> {
        self.token_tx.subscribe()
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.token_tx.borrow().clone()
    }

    pub async fn view(&self) -> SessionView {
        self.state.lock().await.view(Instant::now())
    }

    pub async fn set_password_input(&self, value: String) {
        self.state.lock().await.set_password_input(value);
    }

    pub async fn password_input(&self) -> String {
        self.state.lock().await.password_input().to_string()
    }

    pub async fn login(&self, password: &str) -> Result<SessionView, AuthError> {
        let response = self.backend.login(password).await.map_err(|err| match err {
            ApiError::Rejected { status, detail } => {
                AuthError::Rejected(detail.unwrap_or_else(|| format!("Login failed ({status})")))
            }
            ApiError::Unauthorized { detail } => {
                AuthError::Rejected(detail.unwrap_or_else(|| "Login failed (401)".to_string()))
            }
            ApiError::InvalidBody(_) => AuthError::TokenMissing,
            ApiError::Unreachable(_) | ApiError::InvalidEndpoint(_) => AuthError::Unreachable,
        });

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                log_warn!("login failed: {err}");
                return Err(err);
            }
        };

        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or(AuthError::TokenMissing)?;

        let view = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            state.on_login_success(SessionToken::new(token), now);
            self.publish(&state, now)
        };
        log_info!("operator signed in");
        Ok(view)
    }

    /// Pointer, key, touch or presence activity.
    pub async fn record_activity(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if state.record_activity(now) {
            log_info!("lock screen dismissed");
            self.publish(&state, now);
        }
    }

    pub async fn lock(&self) {
        let mut state = self.state.lock().await;
        if state.lock() {
            log_info!("session locked by operator");
            self.publish(&state, Instant::now());
        }
    }

    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if state.logout() {
            log_info!("operator signed out");
            self.publish(&state, Instant::now());
        }
    }

    /// Called when any authenticated endpoint answers 401.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.invalidate() {
            log_warn!("session rejected by backend; signing out");
            self.publish(&state, Instant::now());
        }
    }

    /// Starts the auto-lock ticker. Restarting replaces the previous ticker.
    pub async fn start_auto_lock(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone_without_ticker();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(LOCK_CHECK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut state = controller.state.lock().await;
                let now = Instant::now();
                if state.on_tick(now) {
                    log_info!("session locked after {:?} idle", super::LOCK_TIMEOUT);
                    controller.publish(&state, now);
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    pub async fn stop_auto_lock(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    // The ticker task must not keep its own handle alive.
    fn clone_without_ticker(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            token_tx: Arc::clone(&self.token_tx),
            backend: Arc::clone(&self.backend),
            emitter: Arc::clone(&self.emitter),
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    fn publish(&self, state: &SessionState, now: Instant) -> SessionView {
        let token = state.token().cloned();
        self.token_tx.send_if_modified(|current| {
            if *current == token {
                return false;
            }
            *current = token;
            true
        });

        let view = state.view(now);
        self.emitter.emit(UiEvent::Session(view.clone()));
        view
    }
}

/// Restricted handle given to pollers and the dispatcher: read the token,
/// report activity, clear the token. Setting a token is not possible.
#[derive(Clone)]
pub struct SessionLink {
    controller: SessionController,
}

impl SessionLink {
    pub fn current_token(&self) -> Option<SessionToken> {
        self.controller.current_token()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionToken>> {
        self.controller.subscribe()
    }

    pub async fn record_activity(&self) {
        self.controller.record_activity().await;
    }

    pub async fn invalidate(&self) {
        self.controller.invalidate().await;
    }
}
