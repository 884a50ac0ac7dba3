// Tauri command handlers - one file per domain
pub mod image_jobs;
pub mod settings;
pub mod window;
