//! Logging utilities for Labokit
//! Handles log file cleanup for 7-day retention

use log::info;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

pub const LOG_RETENTION_DAYS: u64 = 7;

pub fn log_retention() -> Duration {
    Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60)
}

/// Deletes `.log` files older than `retention`; returns how many were removed
pub fn cleanup_old_logs(logs_dir: &Path, retention: Duration) -> usize {
    if !logs_dir.exists() {
        return 0;
    }

    let now = SystemTime::now();
    let mut removed = 0;

    if let Ok(entries) = fs::read_dir(logs_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "log") {
                continue;
            }

            let expired = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map_or(false, |age| age > retention);

            if expired && fs::remove_file(&path).is_ok() {
                info!("Cleaned up old log: {:?}", path.file_name());
                removed += 1;
            }
        }
    }

    removed
}
