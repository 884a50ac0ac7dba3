//! Error types for the image bridge.
//!
//! Every failure reaching the UI is a [`BridgeError`]. It serializes as
//! `{ "kind": ..., "message": ... }` so the frontend can render the message
//! verbatim and branch on the kind (e.g. suggest a retry after a timeout).

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Request rejected before any worker was located
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Worker missing or not launchable
    #[error("Failed to start worker: {0}")]
    Spawn(String),

    /// Worker exited non-zero or never reported success
    #[error("Process failed with code {}. Output: {output}", describe_exit(.exit_code))]
    WorkerFailure { exit_code: Option<i32>, output: String },

    /// Worker exceeded its time budget and was killed
    #[error("Process timeout after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Another job is already running")]
    Busy,

    #[error("No job is running")]
    NoActiveJob,

    #[error("Could not determine image dimensions")]
    DimensionsUnavailable,

    #[error("Failed to read image {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl BridgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidRequest(_) => "invalid_request",
            BridgeError::Spawn(_) => "spawn_error",
            BridgeError::WorkerFailure { .. } => "worker_failure",
            BridgeError::Timeout { .. } => "timeout",
            BridgeError::Cancelled => "cancelled",
            BridgeError::Busy => "busy",
            BridgeError::NoActiveJob => "no_active_job",
            BridgeError::DimensionsUnavailable => "dimensions_unavailable",
            BridgeError::FileRead { .. } => "file_read_error",
            BridgeError::Settings(_) => "settings_error",
        }
    }

    pub fn spawn<T: Into<String>>(msg: T) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn invalid_request<T: Into<String>>(msg: T) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn settings<T: Into<String>>(msg: T) -> Self {
        Self::Settings(msg.into())
    }

    pub fn file_read(path: impl Into<String>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }
}

impl Serialize for BridgeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BridgeError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_kind_and_message() {
        let err = BridgeError::Timeout { elapsed_ms: 600_000 };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["message"], "Process timeout after 600000 ms");
    }

    #[test]
    fn test_worker_failure_message_carries_output() {
        let err = BridgeError::WorkerFailure {
            exit_code: Some(1),
            output: "ERROR: boom\n".to_string(),
        };
        assert_eq!(err.to_string(), "Process failed with code 1. Output: ERROR: boom\n");

        let killed = BridgeError::WorkerFailure {
            exit_code: None,
            output: String::new(),
        };
        assert!(killed.to_string().contains("terminated by signal"));
    }
}
