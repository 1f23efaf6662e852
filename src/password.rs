//! Change-password form and its single request.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::api::{ApiError, Backend, PasswordChangeRequest};
use crate::session::SessionLink;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub const MIN_PASSWORD_LEN: usize = 4;

pub const PASSWORD_CHANGED: &str = "Password changed successfully.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    /// Checks run in order; the first failure wins.
    pub fn validate(&self) -> Result<(), PasswordError> {
        if self.current_password.is_empty()
            || self.new_password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(PasswordError::MissingFields);
        }
        if self.new_password != self.confirm_password {
            return Err(PasswordError::Mismatch);
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PasswordError::TooShort);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn to_request(&self) -> PasswordChangeRequest {
        PasswordChangeRequest {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
            confirm_password: self.confirm_password.clone(),
        }
    }
}

/// `Display` is the message shown under the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("Fill all password fields.")]
    MissingFields,
    #[error("New password and Confirm password must match.")]
    Mismatch,
    #[error("New password too short.")]
    TooShort,
    #[error("Not signed in.")]
    NotSignedIn,
    /// Server detail or the generic failure text.
    #[error("{0}")]
    Rejected(String),
    #[error("Backend not reachable.")]
    Unreachable,
}

#[derive(Clone)]
pub struct PasswordFlow {
    backend: Arc<dyn Backend>,
    session: SessionLink,
}

impl PasswordFlow {
    pub fn new(backend: Arc<dyn Backend>, session: SessionLink) -> Self {
        Self { backend, session }
    }

    /// Validates locally, then posts once. The form is cleared only on
    /// success; the session token is left alone unless the server answers 401.
    pub async fn change_password(
        &self,
        form: &mut PasswordChangeForm,
    ) -> Result<&'static str, PasswordError> {
        form.validate()?;
        let token = self
            .session
            .current_token()
            .ok_or(PasswordError::NotSignedIn)?;

        match self.backend.change_password(&token, &form.to_request()).await {
            Ok(()) => {
                log_info!("operator password changed");
                form.clear();
                Ok(PASSWORD_CHANGED)
            }
            Err(ApiError::Unauthorized { detail }) => {
                log_warn!("password change unauthorized; ending session");
                self.session.invalidate().await;
                Err(PasswordError::Rejected(
                    detail.unwrap_or_else(|| "Password change failed.".to_string()),
                ))
            }
            Err(ApiError::Rejected { detail, .. }) => Err(PasswordError::Rejected(
                detail.unwrap_or_else(|| "Password change failed.".to_string()),
            )),
            Err(ApiError::InvalidBody(_)) => {
                Err(PasswordError::Rejected("Password change failed.".to_string()))
            }
            Err(err @ (ApiError::Unreachable(_) | ApiError::InvalidEndpoint(_))) => {
                log_warn!("password change failed: {err}");
                Err(PasswordError::Unreachable)
            }
        }
    }
}
