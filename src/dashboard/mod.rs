//! Composition root wiring the session, pollers, dispatcher and settings.

pub mod controller;
pub mod view;

pub use controller::{Dashboard, DashboardDeps};
pub use view::{DashboardView, Tab};

/// Window control used when the live view opens.
pub trait ScreenControl: Send + Sync {
    fn request_fullscreen(&self) -> Result<(), String>;
}
