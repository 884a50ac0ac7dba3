// Image job command handlers
use crate::bridge::{FilePicker, ImageBridge};
use crate::models::{ActiveJob, ConvertFormat, ImageDimensions, JobRequest, UpscaleModel};
use crate::utils::BridgeError;
use std::sync::Arc;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

pub const PROGRESS_EVENT: &str = "process-progress";

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "png", "jpeg", "webp"];

/// Native open dialog filtered to the image types the worker accepts
pub struct DialogFilePicker {
    app: AppHandle,
}

impl DialogFilePicker {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl FilePicker for DialogFilePicker {
    fn pick_image(&self) -> Option<String> {
        self.app
            .dialog()
            .file()
            .add_filter("Images", &IMAGE_EXTENSIONS)
            .blocking_pick_file()
            .and_then(|picked| picked.into_path().ok())
            .map(|path| path.to_string_lossy().to_string())
    }
}

#[tauri::command]
pub async fn open_file(bridge: State<'_, Arc<ImageBridge>>) -> Result<Option<String>, BridgeError> {
    Ok(bridge.pick_input_file().await)
}

#[tauri::command]
pub async fn process_image(
    bridge: State<'_, Arc<ImageBridge>>,
    request: JobRequest,
) -> Result<String, BridgeError> {
    bridge.submit(request).await
}

#[tauri::command]
pub fn cancel_image_job(bridge: State<'_, Arc<ImageBridge>>) -> Result<(), BridgeError> {
    bridge.cancel_active_job()
}

#[tauri::command]
pub fn get_active_job(bridge: State<'_, Arc<ImageBridge>>) -> Option<ActiveJob> {
    bridge.active_job()
}

#[tauri::command]
pub async fn read_image_base64(
    bridge: State<'_, Arc<ImageBridge>>,
    file_path: String,
) -> Result<String, BridgeError> {
    bridge.read_as_encoded_bytes(&file_path).await
}

#[tauri::command]
pub async fn read_image_data_url(
    bridge: State<'_, Arc<ImageBridge>>,
    file_path: String,
) -> Result<String, BridgeError> {
    bridge.read_as_data_url(&file_path).await
}

#[tauri::command]
pub async fn get_image_dimensions(
    bridge: State<'_, Arc<ImageBridge>>,
    file_path: String,
) -> Result<ImageDimensions, BridgeError> {
    bridge.get_dimensions(&file_path).await
}

#[tauri::command]
pub async fn get_upscale_models(
    bridge: State<'_, Arc<ImageBridge>>,
) -> Result<Vec<UpscaleModel>, BridgeError> {
    Ok(bridge.upscale_models().await)
}

#[tauri::command]
pub fn get_convert_formats(bridge: State<'_, Arc<ImageBridge>>) -> Vec<ConvertFormat> {
    bridge.convert_formats()
}
