//! Entry point the UI layer talks to.
//!
//! [`ImageBridge`] composes the worker supervisor, the progress channel and
//! the image helpers. It owns the single active-job slot: a second `submit`
//! while one is running is rejected with [`BridgeError::Busy`].

use crate::imaging;
use crate::models::{
    ActiveJob, ConvertFormat, ImageDimensions, JobRequest, ProgressEvent, Settings, UpscaleModel,
};
use crate::process_manager::{
    CancelToken, DeploymentLayout, ProgressChannel, ProgressSubscription, PythonBridgeLocator,
    WorkerSupervisor,
};
use crate::utils::{BridgeError, BridgeResult};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Platform file-open dialog
pub trait FilePicker: Send + Sync {
    /// Blocks until the user picks an image or dismisses the dialog
    fn pick_image(&self) -> Option<String>;
}

/// Picker for headless use; never returns a file
pub struct NoFilePicker;

impl FilePicker for NoFilePicker {
    fn pick_image(&self) -> Option<String> {
        None
    }
}

struct ActiveSlot {
    job: ActiveJob,
    cancel: CancelToken,
}

/// Frees the active-job slot however `submit` returns
struct ActiveJobGuard<'a> {
    slot: &'a Mutex<Option<ActiveSlot>>,
}

impl Drop for ActiveJobGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

pub fn supervisor_from_settings(settings: &Settings, layout: DeploymentLayout) -> WorkerSupervisor {
    let locator = PythonBridgeLocator::new(layout)
        .with_python(settings.python_path.clone())
        .with_script(settings.worker_script.as_ref().map(PathBuf::from));
    WorkerSupervisor::from_settings(Arc::new(locator), settings)
}

async fn validate_request(request: &JobRequest) -> BridgeResult<()> {
    match tokio::fs::metadata(&request.input_path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(BridgeError::invalid_request(format!(
            "Input is not a file: {}",
            request.input_path
        ))),
        Err(_) => Err(BridgeError::invalid_request(format!(
            "Input file not found: {}",
            request.input_path
        ))),
    }
}

pub struct ImageBridge {
    supervisor: RwLock<WorkerSupervisor>,
    progress: Arc<ProgressChannel>,
    active: Mutex<Option<ActiveSlot>>,
    picker: Arc<dyn FilePicker>,
}

impl ImageBridge {
    pub fn new(supervisor: WorkerSupervisor) -> Self {
        Self {
            supervisor: RwLock::new(supervisor),
            progress: Arc::new(ProgressChannel::new()),
            active: Mutex::new(None),
            picker: Arc::new(NoFilePicker),
        }
    }

    pub fn from_settings(settings: &Settings, layout: DeploymentLayout) -> Self {
        Self::new(supervisor_from_settings(settings, layout))
    }

    pub fn with_file_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.picker = picker;
        self
    }

    /// Takes effect from the next submitted job
    pub fn replace_supervisor(&self, supervisor: WorkerSupervisor) {
        *self.supervisor.write() = supervisor;
    }

    pub async fn pick_input_file(&self) -> Option<String> {
        let picker = self.picker.clone();
        match tokio::task::spawn_blocking(move || picker.pick_image()).await {
            Ok(path) => path,
            Err(e) => {
                warn!("File picker task failed: {}", e);
                None
            }
        }
    }

    fn claim(&self, job_id: Uuid, request: &JobRequest, cancel: CancelToken) -> BridgeResult<ActiveJobGuard<'_>> {
        let mut slot = self.active.lock();
        if slot.is_some() {
            return Err(BridgeError::Busy);
        }

        *slot = Some(ActiveSlot {
            job: ActiveJob {
                id: job_id,
                operation: request.operation.clone(),
                input_path: request.input_path.clone(),
                started_at: chrono::Utc::now().to_rfc3339(),
            },
            cancel,
        });

        Ok(ActiveJobGuard { slot: &self.active })
    }

    /// Runs one job to completion; resolves with the worker's output path.
    ///
    /// Every progress event of the job has been delivered by the time this returns.
    pub async fn submit(&self, request: JobRequest) -> BridgeResult<String> {
        validate_request(&request).await?;

        let job_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let _guard = self.claim(job_id, &request, cancel.clone())?;
        let supervisor = self.supervisor.read().clone();

        info!("Submitting job {}: {} {}", job_id, request.operation, request.input_path);

        let (tx, forwarder) = self.progress.forwarder();
        let result = supervisor.execute(job_id, &request, Some(tx), cancel).await;

        if let Err(e) = forwarder.await {
            warn!("Progress forwarder for job {} failed: {}", job_id, e);
        }

        match &result {
            Ok(output_path) => info!("Job {} completed: {}", job_id, output_path),
            Err(e) => warn!("Job {} failed ({}): {}", job_id, e.kind(), e),
        }

        result
    }

    pub fn on_progress<F>(&self, callback: F) -> ProgressSubscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.progress.subscribe(callback)
    }

    pub fn active_job(&self) -> Option<ActiveJob> {
        self.active.lock().as_ref().map(|slot| slot.job.clone())
    }

    pub fn cancel_active_job(&self) -> BridgeResult<()> {
        match self.active.lock().as_ref() {
            Some(slot) => {
                info!("Cancelling job {}", slot.job.id);
                slot.cancel.cancel();
                Ok(())
            }
            None => Err(BridgeError::NoActiveJob),
        }
    }

    pub async fn read_as_encoded_bytes(&self, path: &str) -> BridgeResult<String> {
        imaging::read_base64(Path::new(path)).await
    }

    pub async fn read_as_data_url(&self, path: &str) -> BridgeResult<String> {
        imaging::read_data_url(Path::new(path)).await
    }

    pub async fn get_dimensions(&self, path: &str) -> BridgeResult<ImageDimensions> {
        imaging::read_dimensions(Path::new(path)).await
    }

    /// Locating the worker may probe for a Python interpreter, so it runs off the async workers
    pub async fn upscale_models(&self) -> Vec<UpscaleModel> {
        let supervisor = self.supervisor.read().clone();
        let located = tokio::task::spawn_blocking(move || supervisor.locate_worker()).await;

        let models_dir = match located {
            Ok(Ok(worker)) => worker.models_dir(),
            Ok(Err(e)) => {
                warn!("Could not locate worker for model lookup: {}", e);
                PathBuf::new()
            }
            Err(e) => {
                warn!("Worker lookup task failed: {}", e);
                PathBuf::new()
            }
        };
        imaging::upscale_models(&models_dir)
    }

    pub fn convert_formats(&self) -> Vec<ConvertFormat> {
        imaging::convert_formats()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process_manager::{StaticWorker, WorkerCommand};
    use std::fs;
    use std::time::Duration;

    struct FixedPicker(&'static str);

    impl FilePicker for FixedPicker {
        fn pick_image(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn stub_bridge(dir: &Path, body: &str) -> ImageBridge {
        let script = dir.join("worker.sh");
        fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
        ImageBridge::new(WorkerSupervisor::new(Arc::new(StaticWorker(
            WorkerCommand::interpreted("sh", script),
        ))))
    }

    fn input_image(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, b"\xFF\xD8 not really a jpeg").unwrap();
        path.to_string_lossy().to_string()
    }

    async fn wait_for_active(bridge: &ImageBridge) {
        for _ in 0..200 {
            if bridge.active_job().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never became active");
    }

    #[tokio::test]
    async fn test_submit_delivers_progress_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(
            dir.path(),
            "printf 'LOADING_MODEL\\nEXECUTING_UPSCALE\\nSUCCESS\\n'\n",
        );
        let input = input_image(dir.path(), "cat.jpg");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = bridge.on_progress(move |event| sink.lock().push(event.stage.clone()));

        let output = bridge
            .submit(JobRequest::upscale(input, Some("realesrgan-x4plus")))
            .await
            .unwrap();

        assert_eq!(
            output,
            dir.path()
                .join("cat_realesrgan-x4plus_upscaled.png")
                .to_string_lossy()
        );
        assert_eq!(*seen.lock(), ["LOADING_MODEL", "EXECUTING_UPSCALE", "SUCCESS"]);
        assert!(bridge.active_job().is_none());
        subscription.unregister();
    }

    #[tokio::test]
    async fn test_events_after_unregister_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo SUCCESS\n");
        let input = input_image(dir.path(), "cat.jpg");

        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        bridge
            .on_progress(move |event| sink.lock().push(event.stage.clone()))
            .unregister();

        bridge.submit(JobRequest::remove_background(input)).await.unwrap();
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");
        let bridge = stub_bridge(dir.path(), &format!("touch '{}'\necho SUCCESS\n", marker.display()));

        let missing = dir.path().join("missing.jpg").to_string_lossy().to_string();
        let err = bridge.submit(JobRequest::remove_background(missing)).await.unwrap_err();

        assert_eq!(err.kind(), "invalid_request");
        assert!(!marker.exists());

        let err = bridge
            .submit(JobRequest::remove_background(dir.path().to_string_lossy()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected_then_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Arc::new(stub_bridge(dir.path(), "echo PROCESSING\nsleep 30\n"));
        let input = input_image(dir.path(), "cat.jpg");

        let first = {
            let bridge = bridge.clone();
            let request = JobRequest::remove_background(input.clone());
            tokio::spawn(async move { bridge.submit(request).await })
        };
        wait_for_active(&bridge).await;

        let active = bridge.active_job().unwrap();
        assert_eq!(active.input_path, input);

        let second = bridge.submit(JobRequest::convert(input, Some("png"))).await;
        assert!(matches!(second, Err(BridgeError::Busy)));

        bridge.cancel_active_job().unwrap();
        let first = first.await.unwrap();
        assert!(matches!(first, Err(BridgeError::Cancelled)));
        assert!(bridge.active_job().is_none());
    }

    #[tokio::test]
    async fn test_failed_job_frees_slot() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo PROCESSING\nexit 1\n");
        let input = input_image(dir.path(), "cat.jpg");

        let err = bridge.submit(JobRequest::remove_background(input.clone())).await.unwrap_err();
        assert_eq!(err.kind(), "worker_failure");

        let err = bridge.submit(JobRequest::remove_background(input)).await.unwrap_err();
        assert_eq!(err.kind(), "worker_failure");
    }

    #[tokio::test]
    async fn test_replaced_supervisor_runs_next_job() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo FIRST\necho SUCCESS\n");
        let input = input_image(dir.path(), "cat.jpg");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = bridge.on_progress(move |event| sink.lock().push(event.stage.clone()));

        bridge.submit(JobRequest::remove_background(input.clone())).await.unwrap();

        let replacement = dir.path().join("replacement.sh");
        fs::write(&replacement, "#!/bin/sh\necho SECOND\necho SUCCESS\n").unwrap();
        let settings = Settings {
            python_path: Some("sh".to_string()),
            worker_script: Some(replacement.to_string_lossy().to_string()),
            job_timeout_secs: 5,
            ..Settings::default()
        };
        bridge.replace_supervisor(supervisor_from_settings(&settings, DeploymentLayout::Development));

        bridge.submit(JobRequest::remove_background(input)).await.unwrap();
        assert_eq!(*seen.lock(), ["FIRST", "SUCCESS", "SECOND", "SUCCESS"]);
    }

    #[test]
    fn test_cancel_without_job() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo SUCCESS\n");
        assert!(matches!(bridge.cancel_active_job(), Err(BridgeError::NoActiveJob)));
    }

    #[tokio::test]
    async fn test_dimension_and_read_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo SUCCESS\n");

        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&800u32.to_be_bytes());
        png.extend_from_slice(&600u32.to_be_bytes());
        let png_path = dir.path().join("photo.png");
        fs::write(&png_path, &png).unwrap();
        let png_path = png_path.to_string_lossy().to_string();

        let dims = bridge.get_dimensions(&png_path).await.unwrap();
        assert_eq!(dims, ImageDimensions::new(800, 600));

        let bmp_path = dir.path().join("photo.bmp");
        fs::write(&bmp_path, b"BM\0\0\0\0").unwrap();
        let err = bridge.get_dimensions(&bmp_path.to_string_lossy()).await.unwrap_err();
        assert!(matches!(err, BridgeError::DimensionsUnavailable));

        let encoded = bridge.read_as_encoded_bytes(&png_path).await.unwrap();
        assert!(encoded.starts_with("iVBORw0KGgo"));
        let data_url = bridge.read_as_data_url(&png_path).await.unwrap();
        assert!(data_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[tokio::test]
    async fn test_pick_input_file_uses_picker() {
        let dir = tempfile::tempdir().unwrap();
        let headless = stub_bridge(dir.path(), "echo SUCCESS\n");
        assert_eq!(headless.pick_input_file().await, None);

        let bridge = stub_bridge(dir.path(), "echo SUCCESS\n")
            .with_file_picker(Arc::new(FixedPicker("/x/cat.jpg")));
        assert_eq!(bridge.pick_input_file().await.as_deref(), Some("/x/cat.jpg"));
    }

    #[tokio::test]
    async fn test_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = stub_bridge(dir.path(), "echo SUCCESS\n");
        let models = bridge.upscale_models().await;
        assert_eq!(models.len(), 5);
        assert!(models.iter().all(|m| !m.is_downloaded));
        assert_eq!(bridge.convert_formats().len(), 6);
    }
}
