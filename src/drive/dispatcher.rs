use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::api::{ApiError, Backend};
use crate::events::{UiEmitter, UiEvent};
use crate::session::{SessionLink, SessionToken};
use crate::{log_debug, log_warn};

use super::{DriveCommand, DriveError, DriveKey, DriveState, DriveView};

const ENABLE_LOGS: bool = true;

/// Turns key edges and control buttons into rover commands.
///
/// Local state is updated before the request goes out. Each command is
/// posted on its own task, so a slow request never holds back the next
/// one. A post still in flight when the session token changes is dropped.
#[derive(Clone)]
pub struct CommandDispatcher {
    state: Arc<Mutex<DriveState>>,
    backend: Arc<dyn Backend>,
    session: SessionLink,
    emitter: Arc<dyn UiEmitter>,
}

impl CommandDispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: SessionLink,
        emitter: Arc<dyn UiEmitter>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(DriveState::default())),
            backend,
            session,
            emitter,
        }
    }

    pub async fn view(&self) -> DriveView {
        self.state.lock().await.view()
    }

    pub async fn is_engaged(&self) -> bool {
        self.state.lock().await.is_engaged()
    }

    /// Enters or leaves drive mode. Leaving sends STOP only when
    /// `stop_on_exit` is set and a command other than STOP is active.
    pub async fn set_engaged(&self, engaged: bool, stop_on_exit: bool) {
        let mut state = self.state.lock().await;
        if !state.set_engaged(engaged) {
            return;
        }

        if !engaged && stop_on_exit && state.active() != DriveCommand::Stop {
            if let Some(token) = self.session.current_token() {
                self.dispatch(&mut state, token, DriveCommand::Stop);
                return;
            }
        }
        self.emitter.emit(UiEvent::Drive(state.view()));
    }

    pub async fn key_down(
        &self,
        key: DriveKey,
        repeat: bool,
    ) -> Result<Option<DriveCommand>, DriveError> {
        let mut state = self.state.lock().await;
        if !state.is_engaged() {
            return Err(DriveError::Inactive);
        }
        let token = self.session.current_token().ok_or(DriveError::NotSignedIn)?;

        let command = state.key_down(key, repeat);
        if let Some(command) = command {
            self.dispatch(&mut state, token, command);
        }
        Ok(command)
    }

    pub async fn key_up(&self, key: DriveKey) -> Result<Option<DriveCommand>, DriveError> {
        let mut state = self.state.lock().await;
        if !state.is_engaged() {
            return Err(DriveError::Inactive);
        }
        let token = self.session.current_token().ok_or(DriveError::NotSignedIn)?;

        let command = state.key_up(key);
        if let Some(command) = command {
            self.dispatch(&mut state, token, command);
        }
        Ok(command)
    }

    /// On-screen control buttons. Only a session is required.
    pub async fn send(&self, command: DriveCommand) -> Result<(), DriveError> {
        let token = self.session.current_token().ok_or(DriveError::NotSignedIn)?;
        let mut state = self.state.lock().await;
        self.dispatch(&mut state, token, command);
        Ok(())
    }

    /// Forgets held keys, e.g. when the window loses focus.
    pub async fn release_all(&self) {
        self.state.lock().await.release_all();
    }

    fn dispatch(&self, state: &mut DriveState, token: SessionToken, command: DriveCommand) {
        state.record(command, Utc::now());
        self.emitter.emit(UiEvent::Drive(state.view()));

        tokio::spawn(post_command(
            Arc::clone(&self.backend),
            self.session.clone(),
            token,
            command,
        ));
    }
}

async fn post_command(
    backend: Arc<dyn Backend>,
    session: SessionLink,
    token: SessionToken,
    command: DriveCommand,
) {
    let result = tokio::select! {
        _ = token_replaced(session.subscribe(), &token) => {
            log_debug!("session changed; {} dropped", command.as_str());
            return;
        }
        result = backend.send_command(&token, command) => result,
    };

    match result {
        Ok(()) => log_debug!("command {} posted", command.as_str()),
        Err(ApiError::Unauthorized { .. }) => {
            log_warn!("control rejected as unauthorized; ending session");
            session.invalidate().await;
        }
        Err(err) => log_warn!("control command {} failed: {err}", command.as_str()),
    }
}

/// Resolves once the published token is no longer `token`.
async fn token_replaced(
    mut token_rx: watch::Receiver<Option<SessionToken>>,
    token: &SessionToken,
) {
    loop {
        if token_rx.borrow_and_update().as_ref() != Some(token) {
            return;
        }
        if token_rx.changed().await.is_err() {
            return;
        }
    }
}
