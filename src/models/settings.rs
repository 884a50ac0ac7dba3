// Settings data models
use serde::{Deserialize, Serialize};

pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;

/// How the `SUCCESS` token is matched against captured worker stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuccessMarker {
    /// Token appears anywhere in the captured text
    Substring,
    /// Some captured line equals the token
    #[default]
    Line,
    /// The final captured line equals the token
    LastLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default)]
    pub python_path: Option<String>,
    #[serde(default)]
    pub worker_script: Option<String>,
    #[serde(default)]
    pub success_marker: SuccessMarker,
}

fn default_job_timeout_secs() -> u64 {
    DEFAULT_JOB_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            python_path: None,
            worker_script: None,
            success_marker: SuccessMarker::default(),
        }
    }
}
