use serde::{Deserialize, Serialize};

use crate::drive::DriveView;
use crate::history::HistoryView;
use crate::live::LiveView;
use crate::session::SessionView;
use crate::settings::DashboardSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tab {
    #[default]
    Home,
    History,
    Settings,
}

/// Which panels are showing. Only the tab affects which loops run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Selection {
    pub tab: Tab,
    pub live_view_open: bool,
}

/// Everything the front end renders, in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub session: SessionView,
    pub tab: Tab,
    pub live_view_open: bool,
    pub live: LiveView,
    pub history: HistoryView,
    pub drive: DriveView,
    pub settings: DashboardSettings,
    /// Present only while signed in.
    pub video_url: Option<String>,
}
