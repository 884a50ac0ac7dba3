// Atomic JSON file operations

use crate::utils::{BridgeError, BridgeResult};
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

fn read_locked<T: DeserializeOwned>(path: &Path) -> BridgeResult<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| BridgeError::settings(format!("Failed to read {:?}: {}", path, e)))?;

    serde_json::from_str(&contents)
        .map_err(|e| BridgeError::settings(format!("Failed to parse JSON from {:?}: {}", path, e)))
}

fn write_locked<T: Serialize>(path: &Path, data: &T) -> BridgeResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::settings(format!("Failed to create directory {:?}: {}", parent, e))
        })?;
    }

    let json_string = serde_json::to_string_pretty(data)
        .map_err(|e| BridgeError::settings(format!("Failed to serialize data: {}", e)))?;

    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path).map_err(|e| {
        BridgeError::settings(format!("Failed to create temp file {:?}: {}", temp_path, e))
    })?;

    temp_file
        .write_all(json_string.as_bytes())
        .and_then(|_| temp_file.sync_all())
        .map_err(|e| BridgeError::settings(format!("Failed to write temp file: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        BridgeError::settings(format!("Failed to rename temp file to {:?}: {}", path, e))
    })
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> BridgeResult<T> {
    let _lock = FILE_LOCK
        .lock()
        .map_err(|e| BridgeError::settings(format!("Lock error: {}", e)))?;
    read_locked(path)
}

/// Writes JSON atomically using write-to-temp-then-rename
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> BridgeResult<()> {
    let _lock = FILE_LOCK
        .lock()
        .map_err(|e| BridgeError::settings(format!("Lock error: {}", e)))?;
    write_locked(path, data)
}

pub fn initialize_json_file<T: Serialize>(path: &Path, default: &T) -> BridgeResult<()> {
    if !path.exists() {
        debug!("Initializing JSON file: {:?}", path);
        write_json_file(path, default)?;
    }
    Ok(())
}

pub fn read_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> BridgeResult<T> {
    if path.exists() {
        read_json_file(path)
    } else {
        Ok(T::default())
    }
}

/// Read-modify-write under a single lock acquisition; a missing file starts from `T::default()`
pub fn update_json_file<T, F>(path: &Path, update_fn: F) -> BridgeResult<T>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    let _lock = FILE_LOCK
        .lock()
        .map_err(|e| BridgeError::settings(format!("Lock error: {}", e)))?;

    let mut data: T = if path.exists() {
        read_locked(path)?
    } else {
        T::default()
    };
    update_fn(&mut data);
    write_locked(path, &data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    #[test]
    fn test_missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings = read_json_file_or_default(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_update_creates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let updated: Settings = update_json_file(&path, |s: &mut Settings| s.job_timeout_secs = 30).unwrap();
        assert_eq!(updated.job_timeout_secs, 30);

        let reread: Settings = read_json_file(&path).unwrap();
        assert_eq!(reread.job_timeout_secs, 30);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_json_file::<Settings>(&path).unwrap_err();
        assert_eq!(err.kind(), "settings_error");
    }

    #[test]
    fn test_initialize_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let custom = Settings {
            job_timeout_secs: 5,
            ..Settings::default()
        };
        write_json_file(&path, &custom).unwrap();

        initialize_json_file(&path, &Settings::default()).unwrap();
        let reread: Settings = read_json_file(&path).unwrap();
        assert_eq!(reread.job_timeout_secs, 5);
    }
}
