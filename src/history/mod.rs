pub mod poller;

pub use poller::{HistoryFeed, HistoryLoopKey, HistoryPoller, HISTORY_POLL_INTERVAL};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, HistoryEntry};

/// Row counts the history view offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum HistoryLimit {
    L50,
    L100,
    #[default]
    L200,
    L500,
}

impl HistoryLimit {
    pub const ALL: [HistoryLimit; 4] = [
        HistoryLimit::L50,
        HistoryLimit::L100,
        HistoryLimit::L200,
        HistoryLimit::L500,
    ];

    pub fn rows(self) -> u32 {
        match self {
            HistoryLimit::L50 => 50,
            HistoryLimit::L100 => 100,
            HistoryLimit::L200 => 200,
            HistoryLimit::L500 => 500,
        }
    }
}

impl TryFrom<u32> for HistoryLimit {
    type Error = String;

    fn try_from(rows: u32) -> Result<Self, Self::Error> {
        HistoryLimit::ALL
            .into_iter()
            .find(|limit| limit.rows() == rows)
            .ok_or_else(|| format!("unsupported history limit {rows} (expected 50, 100, 200 or 500)"))
    }
}

impl From<HistoryLimit> for u32 {
    fn from(limit: HistoryLimit) -> Self {
        limit.rows()
    }
}

impl fmt::Display for HistoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rows())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub loading: bool,
    pub total_entries: usize,
    pub latest_count: Option<u32>,
    pub latest_at: Option<DateTime<Utc>>,
}

impl HistoryView {
    pub fn new(entries: Vec<HistoryEntry>, loading: bool) -> Self {
        // Served newest first.
        let latest = entries.first();
        Self {
            total_entries: entries.len(),
            latest_count: latest.map(|entry| entry.count),
            latest_at: latest.and_then(HistoryEntry::recorded_at),
            entries,
            loading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Not signed in.")]
    NotSignedIn,
    #[error(transparent)]
    Api(#[from] ApiError),
}
