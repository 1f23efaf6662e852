use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::api::StateResponse;

/// mmWave radar verdict. Unknown server strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MmwaveStatus {
    #[default]
    NoConfirmation,
    HumanConfirmed,
    Other(String),
}

impl MmwaveStatus {
    /// Accepts `NO_CONFIRMATION`, `NO CONFIRMATION`, `human_confirmed`, ...
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return MmwaveStatus::NoConfirmation;
        };

        let normalized = raw.replace('_', " ").to_ascii_uppercase();
        match normalized.as_str() {
            "NO CONFIRMATION" => MmwaveStatus::NoConfirmation,
            "HUMAN CONFIRMED" => MmwaveStatus::HumanConfirmed,
            _ => MmwaveStatus::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MmwaveStatus::NoConfirmation => "NO CONFIRMATION",
            MmwaveStatus::HumanConfirmed => "HUMAN CONFIRMED",
            MmwaveStatus::Other(raw) => raw,
        }
    }
}

impl Serialize for MmwaveStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Clamped to `[0, 1]`; missing or NaN becomes 0.
    pub confidence: f32,
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSnapshot {
    pub human_count: u32,
    pub detections: Vec<Detection>,
    pub mmwave_status: MmwaveStatus,
    pub respiration_detected: bool,
}

impl From<StateResponse> for DetectionSnapshot {
    fn from(response: StateResponse) -> Self {
        let detections = response
            .detections
            .unwrap_or_default()
            .into_iter()
            .map(|wire| Detection {
                confidence: clamp_confidence(wire.confidence.unwrap_or(0.0)),
                meta: wire.meta,
            })
            .collect();

        let (mmwave_status, respiration_detected) = match response.mmwave {
            Some(mmwave) => (
                MmwaveStatus::parse(mmwave.status.as_deref()),
                mmwave.respiration_detected.unwrap_or(false),
            ),
            None => (MmwaveStatus::NoConfirmation, false),
        };

        Self {
            human_count: response.human_count.unwrap_or(0),
            detections,
            mmwave_status,
            respiration_detected,
        }
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Client-side display options applied on top of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFilter {
    pub show_overlays: bool,
    pub confidence_threshold: f32,
}

impl Default for DisplayFilter {
    fn default() -> Self {
        Self {
            show_overlays: true,
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleDetection {
    /// 1-based position among the detections that passed the filter.
    pub ordinal: usize,
    pub confidence: f32,
    pub confidence_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub human_count: u32,
    pub mmwave_status: MmwaveStatus,
    pub respiration_detected: bool,
    pub overlays_enabled: bool,
    pub detections: Vec<VisibleDetection>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DetectionSnapshot {
    pub fn visible_detections(&self, filter: &DisplayFilter) -> Vec<VisibleDetection> {
        if !filter.show_overlays {
            return Vec::new();
        }

        self.detections
            .iter()
            .filter(|detection| detection.confidence >= filter.confidence_threshold)
            .enumerate()
            .map(|(index, detection)| VisibleDetection {
                ordinal: index + 1,
                confidence: detection.confidence,
                confidence_percent: (detection.confidence * 100.0).round() as u8,
            })
            .collect()
    }

    pub fn view(&self, filter: &DisplayFilter, updated_at: Option<DateTime<Utc>>) -> LiveView {
        LiveView {
            human_count: self.human_count,
            mmwave_status: self.mmwave_status.clone(),
            respiration_detected: self.respiration_detected,
            overlays_enabled: filter.show_overlays,
            detections: self.visible_detections(filter),
            updated_at,
        }
    }
}
