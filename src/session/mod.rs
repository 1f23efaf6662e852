pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionLink, LOCK_CHECK_INTERVAL};
pub use state::{SessionPhase, SessionState, SessionToken, SessionView, LOCK_TIMEOUT};

use thiserror::Error;

/// Login failures. `Display` is the text shown under the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Server detail, or `Login failed (<status>)` when none was given.
    #[error("{0}")]
    Rejected(String),
    #[error("Backend not reachable. Check if server is running.")]
    Unreachable,
    #[error("Token not received")]
    TokenMissing,
}
