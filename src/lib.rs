pub mod bridge;
#[cfg(feature = "desktop")]
mod commands;
pub mod file_manager;
pub mod imaging;
pub mod logging;
pub mod models;
pub mod process_manager;
pub mod utils;

pub use bridge::{FilePicker, ImageBridge, NoFilePicker};
pub use models::{ImageDimensions, JobRequest, Operation, ProgressEvent, Settings};
pub use process_manager::{
    CancelToken, DeploymentLayout, ProgressSubscription, PythonBridgeLocator, StaticWorker,
    WorkerCommand, WorkerLocator, WorkerSupervisor,
};
pub use utils::{BridgeError, BridgeResult};

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::bridge::ImageBridge;
    use crate::commands::{
        image_jobs::{
            cancel_image_job, get_active_job, get_convert_formats, get_image_dimensions,
            get_upscale_models, open_file, process_image, read_image_base64, read_image_data_url,
            DialogFilePicker, PROGRESS_EVENT,
        },
        settings::{get_settings, update_settings},
        window::{close_window, maximize_window, minimize_window},
    };
    use crate::file_manager::{initialize_json_file, read_json_file_or_default};
    use crate::logging::{cleanup_old_logs, log_retention};
    use crate::models::Settings;
    use crate::process_manager::{get_python_path, DeploymentLayout};
    use crate::utils::{get_logs_dir, get_settings_json_path, initialize_data_directories};
    use std::sync::Arc;
    use tauri::{Emitter, Manager};
    use tauri_plugin_log::{Target, TargetKind};

    fn initialize_app_data() -> Result<Settings, String> {
        initialize_data_directories()?;

        let path = get_settings_json_path();
        initialize_json_file(&path, &Settings::default()).map_err(|e| e.to_string())?;
        read_json_file_or_default(&path).map_err(|e| e.to_string())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let settings = initialize_app_data().unwrap_or_else(|e| {
            eprintln!("Failed to initialize app data: {}", e);
            Settings::default()
        });

        tauri::Builder::default()
            .plugin(
                tauri_plugin_log::Builder::new()
                    .targets([
                        Target::new(TargetKind::Stdout),
                        Target::new(TargetKind::Folder {
                            path: get_logs_dir(),
                            file_name: Some("labokit".to_string()),
                        }),
                    ])
                    .level(log::LevelFilter::Info)
                    .build(),
            )
            .plugin(tauri_plugin_dialog::init())
            .setup(move |app| {
                cleanup_old_logs(&get_logs_dir(), log_retention());

                // First interpreter lookup spawns `python --version`; keep it off the main thread
                if settings.python_path.is_none() {
                    tauri::async_runtime::spawn_blocking(get_python_path);
                }

                let layout = if cfg!(debug_assertions) {
                    DeploymentLayout::Development
                } else {
                    DeploymentLayout::Packaged {
                        resource_dir: app.path().resource_dir()?,
                    }
                };
                log::info!("Worker layout: {:?}", layout);

                let picker = Arc::new(DialogFilePicker::new(app.handle().clone()));
                let bridge = Arc::new(
                    ImageBridge::from_settings(&settings, layout.clone()).with_file_picker(picker),
                );

                // Lives for the whole app; the UI has exactly one progress listener
                let emitter = app.handle().clone();
                let _subscription = bridge.on_progress(move |event| {
                    let _ = emitter.emit(PROGRESS_EVENT, event);
                });

                app.manage(bridge);
                app.manage(layout);
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                // Image job commands
                open_file,
                process_image,
                cancel_image_job,
                get_active_job,
                read_image_base64,
                read_image_data_url,
                get_image_dimensions,
                get_upscale_models,
                get_convert_formats,
                // Settings
                get_settings,
                update_settings,
                // Window controls
                minimize_window,
                maximize_window,
                close_window,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
