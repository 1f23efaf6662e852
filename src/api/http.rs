use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::config::BackendConfig;
use crate::drive::DriveCommand;
use crate::session::SessionToken;

use super::{
    ApiError, Backend, ControlRequest, ErrorBody, HistoryEntry, LoginRequest, LoginResponse,
    PasswordChangeRequest, StateResponse,
};

/// reqwest-backed client for the rig's JSON API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.config
            .endpoint(path)
            .map_err(|err| ApiError::InvalidEndpoint(format!("{err:#}")))
    }

    /// Sends an authenticated request and sorts the status into [`ApiError`].
    async fn send_authorized(
        &self,
        request: RequestBuilder,
        token: &SessionToken,
    ) -> Result<Response, ApiError> {
        let response = request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|err| ApiError::Unreachable(err.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized {
                detail: error_detail(response).await,
            });
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(response)
    }
}

async fn rejected(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let detail = error_detail(response).await;
    ApiError::Rejected { status, detail }
}

async fn error_detail(response: Response) -> Option<String> {
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail_text())
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/api/login")?)
            .json(&LoginRequest { password })
            .send()
            .await
            .map_err(|err| ApiError::Unreachable(err.to_string()))?;

        // A 401 here means bad credentials, not an expired session.
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        // An unparseable body is treated like a body without a token.
        Ok(response.json::<LoginResponse>().await.unwrap_or_default())
    }

    async fn fetch_state(
        &self,
        token: &SessionToken,
        overlays: bool,
    ) -> Result<StateResponse, ApiError> {
        let mut url = self.url("/api/state")?;
        url.query_pairs_mut()
            .append_pair("overlays", if overlays { "1" } else { "0" });

        self.send_authorized(self.client.get(url), token)
            .await?
            .json::<StateResponse>()
            .await
            .map_err(|err| ApiError::InvalidBody(err.to_string()))
    }

    async fn fetch_history(
        &self,
        token: &SessionToken,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let mut url = self.url("/api/history")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        self.send_authorized(self.client.get(url), token)
            .await?
            .json::<Vec<HistoryEntry>>()
            .await
            .map_err(|err| ApiError::InvalidBody(err.to_string()))
    }

    async fn delete_history(&self, token: &SessionToken) -> Result<(), ApiError> {
        let url = self.url("/api/history")?;
        self.send_authorized(self.client.delete(url), token).await?;
        Ok(())
    }

    async fn send_command(
        &self,
        token: &SessionToken,
        command: DriveCommand,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/control")?;
        let request = self.client.post(url).json(&ControlRequest { command });
        self.send_authorized(request, token).await?;
        Ok(())
    }

    async fn change_password(
        &self,
        token: &SessionToken,
        request: &PasswordChangeRequest,
    ) -> Result<(), ApiError> {
        let url = self.url("/api/password")?;
        let request = self.client.post(url).json(request);
        self.send_authorized(request, token).await?;
        Ok(())
    }

    fn video_stream_url(&self, token: &SessionToken) -> Option<String> {
        let mut url = self.url("/video").ok()?;
        url.query_pairs_mut().append_pair("token", token.expose());
        Some(url.into())
    }
}
