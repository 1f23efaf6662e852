//! Tauri-backed implementations of the UI-facing traits.

use tauri::{AppHandle, Emitter, Manager};

use crate::dashboard::ScreenControl;
use crate::events::{UiEmitter, UiEvent};

const ENABLE_LOGS: bool = true;

pub const MAIN_WINDOW: &str = "main";

/// Forwards every [`UiEvent`] to the webview as a Tauri event.
pub struct TauriEmitter {
    app: AppHandle,
}

impl TauriEmitter {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl UiEmitter for TauriEmitter {
    fn emit(&self, event: UiEvent) {
        if let Err(e) = self.app.emit(event.name(), &event) {
            crate::log_warn!("failed to emit {}: {}", event.name(), e);
        }
    }
}

pub struct WindowFullscreen {
    app: AppHandle,
}

impl WindowFullscreen {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ScreenControl for WindowFullscreen {
    fn request_fullscreen(&self) -> Result<(), String> {
        let window = self
            .app
            .get_webview_window(MAIN_WINDOW)
            .ok_or_else(|| format!("window '{MAIN_WINDOW}' not found"))?;
        window.set_fullscreen(true).map_err(|e| e.to_string())
    }
}
