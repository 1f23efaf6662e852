//! Scripted collaborators for controller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{
    ApiError, Backend, HistoryEntry, LoginResponse, PasswordChangeRequest, StateResponse,
};
use crate::dashboard::ScreenControl;
use crate::drive::{DriveCommand, DriveView};
use crate::events::{UiEmitter, UiEvent};
use crate::history::HistoryView;
use crate::live::{AlertPlayer, AlertSound, LiveView};
use crate::session::{SessionController, SessionToken, SessionView};

pub const TEST_TOKEN: &str = "test-token";

impl StateResponse {
    pub fn with_count(count: u32) -> Self {
        Self {
            human_count: Some(count),
            ..Self::default()
        }
    }
}

/// Logs in against `backend` with a scripted token.
pub async fn signed_in_session(
    backend: Arc<MockBackend>,
    emitter: Arc<RecordingEmitter>,
) -> SessionController {
    backend.push_login(Ok(LoginResponse {
        token: Some(TEST_TOKEN.to_string()),
    }));
    let session = SessionController::new(backend, emitter);
    session
        .login("pw")
        .await
        .expect("scripted login succeeds");
    session
}

#[derive(Default)]
struct Script {
    logins: VecDeque<Result<LoginResponse, ApiError>>,
    login_passwords: Vec<String>,

    states: VecDeque<Result<StateResponse, ApiError>>,
    state_fallback: StateResponse,
    state_delay: Duration,
    state_calls: usize,

    history: Vec<HistoryEntry>,
    history_errors: VecDeque<ApiError>,
    history_limits: Vec<u32>,
    history_deletes: usize,

    commands: Vec<DriveCommand>,
    command_errors: VecDeque<ApiError>,
    command_delay: Duration,

    password_errors: VecDeque<ApiError>,
    password_changes: usize,
}

/// In-memory backend. Each call pops the next scripted result; when a
/// script runs dry the call succeeds with a neutral value.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
}

impl MockBackend {
    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn push_login(&self, result: Result<LoginResponse, ApiError>) {
        self.with(|s| s.logins.push_back(result));
    }

    pub fn login_passwords(&self) -> Vec<String> {
        self.with(|s| s.login_passwords.clone())
    }

    pub fn push_state(&self, result: Result<StateResponse, ApiError>) {
        self.with(|s| s.states.push_back(result));
    }

    pub fn set_state_fallback(&self, response: StateResponse) {
        self.with(|s| s.state_fallback = response);
    }

    pub fn set_state_delay(&self, delay: Duration) {
        self.with(|s| s.state_delay = delay);
    }

    pub fn state_calls(&self) -> usize {
        self.with(|s| s.state_calls)
    }

    pub fn set_history(&self, entries: Vec<HistoryEntry>) {
        self.with(|s| s.history = entries);
    }

    pub fn push_history_error(&self, err: ApiError) {
        self.with(|s| s.history_errors.push_back(err));
    }

    pub fn history_limits(&self) -> Vec<u32> {
        self.with(|s| s.history_limits.clone())
    }

    pub fn history_deletes(&self) -> usize {
        self.with(|s| s.history_deletes)
    }

    pub fn commands(&self) -> Vec<DriveCommand> {
        self.with(|s| s.commands.clone())
    }

    pub fn push_command_error(&self, err: ApiError) {
        self.with(|s| s.command_errors.push_back(err));
    }

    pub fn set_command_delay(&self, delay: Duration) {
        self.with(|s| s.command_delay = delay);
    }

    pub fn push_password_error(&self, err: ApiError) {
        self.with(|s| s.password_errors.push_back(err));
    }

    pub fn password_changes(&self) -> usize {
        self.with(|s| s.password_changes)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn login(&self, password: &str) -> Result<LoginResponse, ApiError> {
        self.with(|s| {
            s.login_passwords.push(password.to_string());
            s.logins
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Unreachable("no scripted login".into())))
        })
    }

    async fn fetch_state(
        &self,
        _token: &SessionToken,
        _overlays: bool,
    ) -> Result<StateResponse, ApiError> {
        let (delay, result) = self.with(|s| {
            s.state_calls += 1;
            let result = s
                .states
                .pop_front()
                .unwrap_or_else(|| Ok(s.state_fallback.clone()));
            (s.state_delay, result)
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn fetch_history(
        &self,
        _token: &SessionToken,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        self.with(|s| {
            s.history_limits.push(limit);
            match s.history_errors.pop_front() {
                Some(err) => Err(err),
                None => Ok(s.history.iter().take(limit as usize).cloned().collect()),
            }
        })
    }

    async fn delete_history(&self, _token: &SessionToken) -> Result<(), ApiError> {
        self.with(|s| {
            s.history_deletes += 1;
            s.history.clear();
        });
        Ok(())
    }

    async fn send_command(
        &self,
        _token: &SessionToken,
        command: DriveCommand,
    ) -> Result<(), ApiError> {
        let delay = self.with(|s| s.command_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            s.commands.push(command);
            match s.command_errors.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    async fn change_password(
        &self,
        _token: &SessionToken,
        _request: &PasswordChangeRequest,
    ) -> Result<(), ApiError> {
        self.with(|s| {
            s.password_changes += 1;
            match s.password_errors.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn video_stream_url(&self, token: &SessionToken) -> Option<String> {
        Some(format!("http://rig.test/video?token={}", token.expose()))
    }
}

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn session_events(&self) -> Vec<SessionView> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Session(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn live_events(&self) -> Vec<LiveView> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Live(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn alert_counts(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Alert(raised) => Some(raised.human_count),
                _ => None,
            })
            .collect()
    }

    pub fn history_events(&self) -> Vec<HistoryView> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::History(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn drive_events(&self) -> Vec<DriveView> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Drive(view) => Some(view),
                _ => None,
            })
            .collect()
    }
}

impl UiEmitter for RecordingEmitter {
    fn emit(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<AlertSound>>,
    fail: bool,
}

impl RecordingPlayer {
    pub fn failing() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn played(&self) -> Vec<AlertSound> {
        self.played.lock().unwrap().clone()
    }
}

impl AlertPlayer for RecordingPlayer {
    fn play(&self, sound: AlertSound) -> Result<(), String> {
        self.played.lock().unwrap().push(sound);
        if self.fail {
            Err("no output device".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct RecordingScreen {
    requests: Mutex<usize>,
    fail: bool,
}

impl RecordingScreen {
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(0),
            fail: true,
        }
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl ScreenControl for RecordingScreen {
    fn request_fullscreen(&self) -> Result<(), String> {
        *self.requests.lock().unwrap() += 1;
        if self.fail {
            Err("window unavailable".to_string())
        } else {
            Ok(())
        }
    }
}
