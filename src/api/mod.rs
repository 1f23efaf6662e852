//! Contract with the rig backend.
//!
//! Every controller talks to the backend through [`Backend`] so the HTTP
//! client can be swapped for a scripted one in tests.

mod http;
mod types;

pub use http::HttpBackend;
pub use types::{
    ControlRequest, DetectionWire, ErrorBody, HistoryEntry, LoginRequest, LoginResponse,
    MmwaveWire, PasswordChangeRequest, StateResponse,
};

use async_trait::async_trait;
use thiserror::Error;

use crate::drive::DriveCommand;
use crate::session::SessionToken;

#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/login`. The only unauthenticated call.
    async fn login(&self, password: &str) -> Result<LoginResponse, ApiError>;

    /// `GET /api/state?overlays=0|1`.
    async fn fetch_state(
        &self,
        token: &SessionToken,
        overlays: bool,
    ) -> Result<StateResponse, ApiError>;

    /// `GET /api/history?limit=N`.
    async fn fetch_history(
        &self,
        token: &SessionToken,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, ApiError>;

    /// `DELETE /api/history`.
    async fn delete_history(&self, token: &SessionToken) -> Result<(), ApiError>;

    /// `POST /api/control`.
    async fn send_command(&self, token: &SessionToken, command: DriveCommand)
        -> Result<(), ApiError>;

    /// `POST /api/password`.
    async fn change_password(
        &self,
        token: &SessionToken,
        request: &PasswordChangeRequest,
    ) -> Result<(), ApiError>;

    /// Stream URL for the thermal camera. The token travels in the query
    /// string because the consuming `<img>` element cannot set headers.
    fn video_stream_url(&self, token: &SessionToken) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 401 from an authenticated endpoint. Always ends the session.
    #[error("unauthorized")]
    Unauthorized { detail: Option<String> },
    #[error("request rejected with status {status}")]
    Rejected { status: u16, detail: Option<String> },
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized { detail: None }
    }
}
