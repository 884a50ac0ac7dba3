// Image job data models
use crate::utils::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Processing operation requested from the worker.
///
/// Serialized as the worker's positional command name (`upscale`, `rembg`,
/// `convert`). Unrecognised names pass through unchanged as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Upscale,
    RemoveBackground,
    Convert,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Upscale => "upscale",
            Operation::RemoveBackground => "rembg",
            Operation::Convert => "convert",
            Operation::Other(name) => name,
        }
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "upscale" => Operation::Upscale,
            "rembg" | "remove_background" | "removeBackground" => Operation::RemoveBackground,
            "convert" => Operation::Convert,
            _ => Operation::Other(value),
        }
    }
}

impl From<&str> for Operation {
    fn from(value: &str) -> Self {
        Operation::from(value.to_string())
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        match value {
            Operation::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One processing request as submitted by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(alias = "filePath")]
    pub input_path: String,
    pub operation: Operation,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl JobRequest {
    pub fn upscale(input_path: impl Into<String>, model: Option<&str>) -> Self {
        Self {
            input_path: input_path.into(),
            operation: Operation::Upscale,
            model: model.map(str::to_string),
            format: None,
        }
    }

    pub fn remove_background(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            operation: Operation::RemoveBackground,
            model: None,
            format: None,
        }
    }

    pub fn convert(input_path: impl Into<String>, format: Option<&str>) -> Self {
        Self {
            input_path: input_path.into(),
            operation: Operation::Convert,
            model: None,
            format: format.map(str::to_string),
        }
    }

    /// Model name, only when it applies to the operation and is non-empty
    pub fn model_param(&self) -> Option<&str> {
        match self.operation {
            Operation::Upscale => self.model.as_deref().filter(|m| !m.is_empty()),
            _ => None,
        }
    }

    /// Target format, only when it applies to the operation and is non-empty
    pub fn format_param(&self) -> Option<&str> {
        match self.operation {
            Operation::Convert => self.format.as_deref().filter(|f| !f.is_empty()),
            _ => None,
        }
    }
}

/// Terminal outcome of a worker run that exited on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub success: bool,
    pub output_path: Option<String>,
    pub output: String,
    pub exit_code: Option<i32>,
}

impl JobResult {
    /// `marker_seen` must already reflect the configured success marker rule.
    pub fn from_exit(
        exit_code: Option<i32>,
        marker_seen: bool,
        output: String,
        output_path: String,
    ) -> Self {
        let success = exit_code == Some(0) && marker_seen;
        Self {
            success,
            output_path: success.then_some(output_path),
            output,
            exit_code,
        }
    }

    pub fn into_outcome(self) -> Result<String, BridgeError> {
        match self.output_path {
            Some(path) if self.success => Ok(path),
            _ => Err(BridgeError::WorkerFailure {
                exit_code: self.exit_code,
                output: self.output,
            }),
        }
    }
}

/// Progress notification forwarded to the UI, one per worker line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub stage: String,
    pub timestamp: i64, // ms since epoch
}

impl ProgressEvent {
    pub fn new(job_id: Uuid, stage: impl Into<String>) -> Self {
        Self {
            job_id,
            stage: stage.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Snapshot of the job currently owned by the bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    pub id: Uuid,
    pub operation: Operation,
    pub input_path: String,
    pub started_at: String,
}
