pub mod api;
pub mod audio;
pub mod config;
pub mod dashboard;
pub mod drive;
pub mod events;
pub mod history;
pub mod live;
pub mod password;
pub mod session;
pub mod settings;
mod polling;
mod utils;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod desktop;
#[cfg(test)]
mod testing;

pub use dashboard::{Dashboard, DashboardDeps};
pub use utils::redact_token;

#[cfg(feature = "desktop")]
use std::sync::Arc;

#[cfg(feature = "desktop")]
use tauri::Manager;

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) dashboard: Dashboard,
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use api::HttpBackend;
    use audio::AudioAlertPlayer;
    use commands::*;
    use config::BackendConfig;
    use desktop::{TauriEmitter, WindowFullscreen};
    use settings::SettingsStore;

    let config = BackendConfig::from_env();
    let debug = config.as_ref().map(|config| config.debug).unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("Sentinel console starting up...");

    tauri::Builder::default()
        .setup(move |app| {
            let result = (|| -> anyhow::Result<()> {
                let config = config.map_err(|err| err.context("invalid backend configuration"))?;
                log::info!("backend at {}", config.base_url);

                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings_store = SettingsStore::new(settings_path)?;

                let handle = app.handle().clone();
                let deps = DashboardDeps {
                    backend: Arc::new(HttpBackend::new(config)?),
                    emitter: Arc::new(TauriEmitter::new(handle.clone())),
                    alerts: Arc::new(AudioAlertPlayer::new()),
                    screen: Arc::new(WindowFullscreen::new(handle)),
                    settings: settings_store,
                };

                // Pollers and the command worker spawn onto Tauri's runtime.
                let dashboard = tauri::async_runtime::block_on(async move {
                    let dashboard = Dashboard::new(deps);
                    dashboard.start().await;
                    dashboard
                });

                app.manage(AppState { dashboard });
                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_dashboard,
            set_password_input,
            login,
            lock_session,
            logout,
            record_activity,
            select_tab,
            open_live_view,
            close_live_view,
            get_video_url,
            set_drive_mode,
            drive_key_down,
            drive_key_up,
            send_drive_command,
            release_drive_keys,
            get_settings,
            update_settings,
            delete_history,
            change_password,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
