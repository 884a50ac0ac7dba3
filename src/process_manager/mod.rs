// Worker process management: locating, launching and supervising the image worker
pub mod image_worker;
pub mod output_path;
pub mod progress;
pub mod worker_locator;

pub use image_worker::{build_worker_args, CancelToken, WorkerSupervisor, DEFAULT_JOB_TIMEOUT, SUCCESS_MARKER};
pub use output_path::{output_path_for, resolve_output_path, sanitize_model_name};
pub use progress::{ProgressCallback, ProgressChannel, ProgressSubscription};
pub use worker_locator::{
    get_python_path, DeploymentLayout, PythonBridgeLocator, StaticWorker, WorkerCommand,
    WorkerLocator,
};
