pub mod dispatcher;
pub mod state;

pub use dispatcher::CommandDispatcher;
pub use state::{
    CommandLog, CommandLogEntry, DriveCommand, DriveKey, DriveState, DriveView,
    COMMAND_LOG_CAPACITY,
};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriveError {
    #[error("Not signed in.")]
    NotSignedIn,
    #[error("Drive mode is off.")]
    Inactive,
}
