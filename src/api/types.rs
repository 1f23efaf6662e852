use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::drive::DriveCommand;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /api/state` body. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub human_count: Option<u32>,
    #[serde(default)]
    pub detections: Option<Vec<DetectionWire>>,
    #[serde(default)]
    pub mmwave: Option<MmwaveWire>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionWire {
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Box coordinates, labels and whatever else the rig attaches.
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmwaveWire {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub respiration_detected: Option<bool>,
}

/// One persisted detection record, newest first as served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unix epoch seconds, possibly fractional.
    pub ts: f64,
    pub count: u32,
}

impl HistoryEntry {
    pub fn recorded_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        if !self.ts.is_finite() {
            return None;
        }
        chrono::DateTime::from_timestamp_millis((self.ts * 1000.0).round() as i64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlRequest {
    pub command: DriveCommand,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Error envelope used by the backend (`{"detail": "..."}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Only non-empty string details are shown to the operator.
    pub fn detail_text(&self) -> Option<String> {
        match &self.detail {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        }
    }
}
