//! Typed notifications pushed from the controllers to the UI layer.

use serde::Serialize;

use crate::drive::DriveView;
use crate::history::HistoryView;
use crate::live::{AlertRaised, LiveView};
use crate::session::SessionView;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum UiEvent {
    Session(SessionView),
    Live(LiveView),
    Alert(AlertRaised),
    History(HistoryView),
    Drive(DriveView),
}

impl UiEvent {
    /// Event channel name on the front-end side.
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::Session(_) => "session-changed",
            UiEvent::Live(_) => "live-updated",
            UiEvent::Alert(_) => "presence-alert",
            UiEvent::History(_) => "history-updated",
            UiEvent::Drive(_) => "drive-updated",
        }
    }
}

/// Sink for [`UiEvent`]s. Implementations must not block.
pub trait UiEmitter: Send + Sync {
    fn emit(&self, event: UiEvent);
}
