use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::history::HistoryLimit;
use crate::live::{AlertSound, DisplayFilter};

pub const MIN_REFRESH_RATE_MS: u64 = 100;
pub const MAX_REFRESH_RATE_MS: u64 = 2000;
const DEFAULT_BACKGROUND: &str = "#0a1020";

/// Operator preferences from the settings tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSettings {
    pub alert_sound: AlertSound,
    /// State poll cadence.
    pub refresh_rate_ms: u64,
    pub show_overlays: bool,
    pub confidence_threshold: f32,
    pub background_color: String,
    pub auto_fullscreen: bool,
    pub history_limit: HistoryLimit,
    /// Send STOP when drive mode is left while the rover is moving.
    pub stop_on_drive_exit: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            alert_sound: AlertSound::default(),
            refresh_rate_ms: 250,
            show_overlays: true,
            confidence_threshold: 0.5,
            background_color: DEFAULT_BACKGROUND.into(),
            auto_fullscreen: false,
            history_limit: HistoryLimit::default(),
            stop_on_drive_exit: false,
        }
    }
}

impl DashboardSettings {
    /// Clamps numeric ranges and replaces an unusable color.
    pub fn normalized(mut self) -> Self {
        self.refresh_rate_ms = self
            .refresh_rate_ms
            .clamp(MIN_REFRESH_RATE_MS, MAX_REFRESH_RATE_MS);
        self.confidence_threshold = if self.confidence_threshold.is_nan() {
            0.5
        } else {
            self.confidence_threshold.clamp(0.0, 1.0)
        };
        if !is_hex_color(&self.background_color) {
            self.background_color = DEFAULT_BACKGROUND.into();
        }
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(
            self.refresh_rate_ms
                .clamp(MIN_REFRESH_RATE_MS, MAX_REFRESH_RATE_MS),
        )
    }

    pub fn display_filter(&self) -> DisplayFilter {
        DisplayFilter {
            show_overlays: self.show_overlays,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .map(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

pub struct SettingsStore {
    /// `None` keeps settings in memory only.
    path: Option<PathBuf>,
    data: RwLock<DashboardSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<DashboardSettings>(&contents).unwrap_or_default()
        } else {
            DashboardSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data.normalized()),
        })
    }

    pub fn in_memory(settings: DashboardSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings.normalized()),
        }
    }

    pub fn get(&self) -> DashboardSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the settings and writes them out. Returns what was stored.
    pub fn update(&self, settings: DashboardSettings) -> Result<DashboardSettings> {
        let settings = settings.normalized();
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings.clone();
        Ok(settings)
    }

    fn persist(&self, data: &DashboardSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = DashboardSettings {
            refresh_rate_ms: 10,
            confidence_threshold: 1.7,
            background_color: "navy".into(),
            ..DashboardSettings::default()
        }
        .normalized();

        assert_eq!(settings.refresh_rate_ms, 100);
        assert_eq!(settings.confidence_threshold, 1.0);
        assert_eq!(settings.background_color, "#0a1020");

        let slow = DashboardSettings {
            refresh_rate_ms: 60_000,
            ..DashboardSettings::default()
        };
        assert_eq!(slow.refresh_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.get(), DashboardSettings::default());

        let stored = store
            .update(DashboardSettings {
                alert_sound: AlertSound::VoiceAlert,
                refresh_rate_ms: 500,
                history_limit: HistoryLimit::L50,
                ..DashboardSettings::default()
            })
            .unwrap();
        assert_eq!(stored.refresh_rate_ms, 500);

        let reloaded = SettingsStore::new(path.clone()).unwrap().get();
        assert_eq!(reloaded, stored);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""alertSound": "Voice Alert""#));
        assert!(raw.contains(r#""historyLimit": 50"#));
    }

    #[test]
    fn corrupt_or_partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(
            SettingsStore::new(corrupt).unwrap().get(),
            DashboardSettings::default()
        );

        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{"showOverlays": false}"#).unwrap();
        let loaded = SettingsStore::new(partial).unwrap().get();
        assert!(!loaded.show_overlays);
        assert_eq!(loaded.refresh_rate_ms, 250);
    }

    #[test]
    fn in_memory_store_never_touches_disk() {
        let store = SettingsStore::in_memory(DashboardSettings::default());
        let stored = store
            .update(DashboardSettings {
                auto_fullscreen: true,
                ..DashboardSettings::default()
            })
            .unwrap();
        assert!(stored.auto_fullscreen);
        assert!(store.get().auto_fullscreen);
    }
}
