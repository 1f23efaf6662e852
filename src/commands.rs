use tauri::State;

use crate::dashboard::{Dashboard, DashboardView, Tab};
use crate::drive::DriveCommand;
use crate::password::PasswordChangeForm;
use crate::session::SessionView;
use crate::settings::DashboardSettings;

use crate::AppState;

fn dashboard_from_state(state: &State<'_, AppState>) -> Dashboard {
    state.dashboard.clone()
}

#[tauri::command]
pub async fn get_dashboard(state: State<'_, AppState>) -> Result<DashboardView, String> {
    Ok(dashboard_from_state(&state).view().await)
}

#[tauri::command]
pub async fn set_password_input(state: State<'_, AppState>, value: String) -> Result<(), String> {
    dashboard_from_state(&state).set_password_input(value).await;
    Ok(())
}

#[tauri::command]
pub async fn login(state: State<'_, AppState>, password: String) -> Result<SessionView, String> {
    dashboard_from_state(&state)
        .login(&password)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn lock_session(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state).lock().await;
    Ok(())
}

#[tauri::command]
pub async fn logout(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state).logout().await;
    Ok(())
}

/// Pointer move, pointer down and touch start.
#[tauri::command]
pub async fn record_activity(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state).record_activity().await;
    Ok(())
}

#[tauri::command]
pub async fn select_tab(state: State<'_, AppState>, tab: Tab) -> Result<(), String> {
    dashboard_from_state(&state).select_tab(tab).await;
    Ok(())
}

#[tauri::command]
pub async fn open_live_view(state: State<'_, AppState>) -> Result<Option<String>, String> {
    let dashboard = dashboard_from_state(&state);
    dashboard.open_live_view().await;
    Ok(dashboard.video_stream_url())
}

#[tauri::command]
pub async fn close_live_view(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state).close_live_view().await;
    Ok(())
}

#[tauri::command]
pub async fn get_video_url(state: State<'_, AppState>) -> Result<Option<String>, String> {
    Ok(dashboard_from_state(&state).video_stream_url())
}

#[tauri::command]
pub async fn set_drive_mode(state: State<'_, AppState>, engaged: bool) -> Result<(), String> {
    dashboard_from_state(&state).set_drive_mode(engaged).await;
    Ok(())
}

#[tauri::command]
pub async fn drive_key_down(
    state: State<'_, AppState>,
    key: String,
    repeat: bool,
) -> Result<Option<DriveCommand>, String> {
    dashboard_from_state(&state)
        .key_down(&key, repeat)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn drive_key_up(
    state: State<'_, AppState>,
    key: String,
) -> Result<Option<DriveCommand>, String> {
    dashboard_from_state(&state)
        .key_up(&key)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn send_drive_command(
    state: State<'_, AppState>,
    command: DriveCommand,
) -> Result<(), String> {
    dashboard_from_state(&state)
        .send_command(command)
        .await
        .map_err(|e| e.to_string())
}

/// Window blur: forget held keys so a missed key-up cannot wedge them.
#[tauri::command]
pub async fn release_drive_keys(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state).release_keys().await;
    Ok(())
}

#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<DashboardSettings, String> {
    Ok(dashboard_from_state(&state).settings())
}

#[tauri::command]
pub async fn update_settings(
    state: State<'_, AppState>,
    settings: DashboardSettings,
) -> Result<DashboardSettings, String> {
    dashboard_from_state(&state)
        .update_settings(settings)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_history(state: State<'_, AppState>) -> Result<(), String> {
    dashboard_from_state(&state)
        .delete_history()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn change_password(
    state: State<'_, AppState>,
    form: PasswordChangeForm,
) -> Result<String, String> {
    dashboard_from_state(&state)
        .change_password(form)
        .await
        .map(str::to_string)
        .map_err(|e| e.to_string())
}
