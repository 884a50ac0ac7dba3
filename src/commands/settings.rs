// Settings command handlers
use crate::bridge::{supervisor_from_settings, ImageBridge};
use crate::file_manager::{read_json_file_or_default, update_json_file};
use crate::models::{Settings, SuccessMarker};
use crate::process_manager::DeploymentLayout;
use crate::utils::{get_settings_json_path, BridgeError};
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use tauri::State;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsParams {
    pub job_timeout_secs: Option<u64>,
    /// Empty string clears the override
    pub python_path: Option<String>,
    /// Empty string clears the override
    pub worker_script: Option<String>,
    pub success_marker: Option<SuccessMarker>,
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.trim().is_empty())
}

#[tauri::command]
pub fn get_settings() -> Result<Settings, BridgeError> {
    read_json_file_or_default(&get_settings_json_path())
}

/// Persists a partial update and reconfigures the worker for the next job
#[tauri::command]
pub fn update_settings(
    bridge: State<'_, Arc<ImageBridge>>,
    layout: State<'_, DeploymentLayout>,
    settings: UpdateSettingsParams,
) -> Result<Settings, BridgeError> {
    if settings.job_timeout_secs == Some(0) {
        return Err(BridgeError::settings("Job timeout must be at least one second"));
    }

    let updated = update_json_file(&get_settings_json_path(), |current: &mut Settings| {
        if let Some(timeout) = settings.job_timeout_secs {
            current.job_timeout_secs = timeout;
        }
        if let Some(python_path) = settings.python_path {
            current.python_path = non_empty(python_path);
        }
        if let Some(worker_script) = settings.worker_script {
            current.worker_script = non_empty(worker_script);
        }
        if let Some(rule) = settings.success_marker {
            current.success_marker = rule;
        }
    })?;

    bridge.replace_supervisor(supervisor_from_settings(&updated, layout.inner().clone()));
    debug!("Settings updated: {:?}", updated);
    Ok(updated)
}
