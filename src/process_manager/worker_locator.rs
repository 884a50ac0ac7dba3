// Worker executable resolution
// Packaged builds ship the bridge script in the resource dir; dev builds find it near the binary

use crate::utils::{BridgeError, BridgeResult};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;

const WORKER_DIR: &str = "pyfile";
const WORKER_SCRIPT: &str = "bridge.py";
const DEV_SEARCH_DEPTH: usize = 4;

static PYTHON_PATH: OnceLock<String> = OnceLock::new();

/// How to launch the worker: an optional interpreter followed by the entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub interpreter: Option<String>,
    pub entry_point: PathBuf,
}

impl WorkerCommand {
    pub fn interpreted(interpreter: impl Into<String>, entry_point: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
            entry_point: entry_point.into(),
        }
    }

    pub fn executable(entry_point: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: None,
            entry_point: entry_point.into(),
        }
    }

    pub fn ensure_exists(&self) -> BridgeResult<()> {
        if self.entry_point.is_file() {
            Ok(())
        } else {
            Err(BridgeError::spawn(format!(
                "Worker not found: {:?} (upscale models expected in {:?}); \
                 set `worker_script` in settings to use another location",
                self.entry_point,
                self.models_dir()
            )))
        }
    }

    /// Base command with the entry point already in place; operation args follow
    pub fn command(&self) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.entry_point);
                cmd
            }
            None => Command::new(&self.entry_point),
        };

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        // Own process group, so the worker's children can be killed with it
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    /// RealESRGAN model files, laid out next to the worker directory
    pub fn models_dir(&self) -> PathBuf {
        self.entry_point
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."))
            .join("utils")
            .join("upscale")
            .join("models")
    }
}

/// Strategy for finding the worker, swappable so tests can run a stub
pub trait WorkerLocator: Send + Sync {
    fn locate(&self) -> BridgeResult<WorkerCommand>;
}

/// Always hands out the same command
#[derive(Debug, Clone)]
pub struct StaticWorker(pub WorkerCommand);

impl WorkerLocator for StaticWorker {
    fn locate(&self) -> BridgeResult<WorkerCommand> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentLayout {
    /// Installed app; the script is unpacked into the bundle's resource directory
    Packaged { resource_dir: PathBuf },
    /// Running from a source checkout
    Development,
}

/// Locates `pyfile/bridge.py` and the Python interpreter that runs it
#[derive(Debug, Clone)]
pub struct PythonBridgeLocator {
    layout: DeploymentLayout,
    python_path: Option<String>,
    script_path: Option<PathBuf>,
}

impl PythonBridgeLocator {
    pub fn new(layout: DeploymentLayout) -> Self {
        Self {
            layout,
            python_path: None,
            script_path: None,
        }
    }

    pub fn with_python(mut self, python_path: Option<String>) -> Self {
        self.python_path = python_path.filter(|p| !p.is_empty());
        self
    }

    pub fn with_script(mut self, script_path: Option<PathBuf>) -> Self {
        self.script_path = script_path;
        self
    }

    fn script(&self) -> PathBuf {
        if let Some(path) = &self.script_path {
            return path.clone();
        }

        match &self.layout {
            DeploymentLayout::Packaged { resource_dir } => {
                resource_dir.join(WORKER_DIR).join(WORKER_SCRIPT)
            }
            DeploymentLayout::Development => get_dev_worker_script(),
        }
    }
}

impl WorkerLocator for PythonBridgeLocator {
    fn locate(&self) -> BridgeResult<WorkerCommand> {
        let python = self
            .python_path
            .clone()
            .unwrap_or_else(get_python_path);
        Ok(WorkerCommand::interpreted(python, self.script()))
    }
}

/// First interpreter on PATH that answers `--version`; probed once per process
pub fn get_python_path() -> String {
    PYTHON_PATH
        .get_or_init(|| {
            #[cfg(target_os = "windows")]
            let candidates = ["python", "python3", "py"];

            #[cfg(not(target_os = "windows"))]
            let candidates = ["python3", "python"];

            for candidate in candidates {
                let mut cmd = std::process::Command::new(candidate);
                cmd.arg("--version");

                #[cfg(windows)]
                cmd.creation_flags(CREATE_NO_WINDOW);

                if cmd.output().is_ok() {
                    return candidate.to_string();
                }
            }

            "python".to_string()
        })
        .clone()
}

fn find_worker_script_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(DEV_SEARCH_DEPTH + 1)
        .map(|dir| dir.join(WORKER_DIR).join(WORKER_SCRIPT))
        .find(|candidate| candidate.exists())
}

/// Walks up from the executable (target/debug, ...) to the checkout root
fn get_dev_worker_script() -> PathBuf {
    if let Some(found) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(find_worker_script_from))
    {
        debug!("Found worker script at: {:?}", found);
        return found;
    }

    let fallback = std::env::current_dir()
        .unwrap_or_default()
        .join(WORKER_DIR)
        .join(WORKER_SCRIPT);
    debug!("Fallback to current dir worker script: {:?}", fallback);
    fallback
}
