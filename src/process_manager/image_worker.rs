// Image worker process management
// Spawns one worker per job, streams its output as progress and enforces the time budget

use super::output_path::output_path_for;
use super::worker_locator::{WorkerCommand, WorkerLocator};
use crate::models::{JobRequest, JobResult, ProgressEvent, Settings, SuccessMarker};
use crate::utils::{BridgeError, BridgeResult};
use log::{debug, info, warn};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;

pub const SUCCESS_MARKER: &str = "SUCCESS";
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

const STDERR_PREFIX: &str = "ERROR: ";
const STDERR_CHUNK_SIZE: usize = 4096;
// How long stdout/stderr may stay open after the worker itself has exited
const EXIT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One-shot cancellation signal shared between the bridge and a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<Notify>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a permit, so a job that starts waiting later still sees it
    pub fn cancel(&self) {
        self.0.notify_one();
    }

    pub async fn cancelled(&self) {
        self.0.notified().await
    }
}

/// Live state of one spawned worker
struct JobHandle {
    job_id: Uuid,
    pid: Option<u32>,
    started_at: Instant,
    cancel: CancelToken,
    output: String,
}

impl JobHandle {
    fn new(job_id: Uuid, pid: Option<u32>, cancel: CancelToken) -> Self {
        Self {
            job_id,
            pid,
            started_at: Instant::now(),
            cancel,
            output: String::new(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Appends the trimmed line; `None` for blank lines
    fn record_line(&mut self, raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return None;
        }
        self.output.push_str(line);
        self.output.push('\n');
        Some(line.to_string())
    }
}

enum Termination {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(std::io::Error),
}

/// Aborts the wrapped task when dropped, so no reader outlives its job
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// `<operation> --input <in> --output <out> [--model <m>] [--format <f>]`
pub fn build_worker_args(request: &JobRequest, output_path: &str) -> Vec<String> {
    let mut args = vec![
        request.operation.as_str().to_string(),
        "--input".to_string(),
        request.input_path.clone(),
        "--output".to_string(),
        output_path.to_string(),
    ];

    if let Some(model) = request.model_param() {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    if let Some(format) = request.format_param() {
        args.push("--format".to_string());
        args.push(format.to_string());
    }

    args
}

pub fn marker_seen(output: &str, rule: SuccessMarker) -> bool {
    match rule {
        SuccessMarker::Substring => output.contains(SUCCESS_MARKER),
        SuccessMarker::Line => output.lines().any(|line| line == SUCCESS_MARKER),
        SuccessMarker::LastLine => output.lines().last() == Some(SUCCESS_MARKER),
    }
}

async fn emit(progress: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // Receiver gone means nobody is listening anymore
        let _ = tx.send(event).await;
    }
}

/// Length of a partial UTF-8 sequence at the end of `bytes` (0 to 3)
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let start = bytes.len() - back;
        if bytes[start] & 0xC0 != 0x80 {
            return match std::str::from_utf8(&bytes[start..]) {
                Err(e) if e.error_len().is_none() => back,
                _ => 0,
            };
        }
    }
    0
}

/// Drains `pending` as text, holding back a partial character for the next read.
/// Invalid bytes become U+FFFD.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    let tail = pending.split_off(pending.len() - incomplete_utf8_tail(pending));
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}

async fn forward_stderr(
    mut stderr: ChildStderr,
    job_id: Uuid,
    progress: Option<mpsc::Sender<ProgressEvent>>,
) {
    let mut buf = vec![0u8; STDERR_CHUNK_SIZE];
    let mut pending = Vec::new();
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let chunk = take_utf8_prefix(&mut pending);
                if chunk.is_empty() {
                    continue;
                }
                warn!("[Worker stderr] {}", chunk.trim_end());
                emit(
                    &progress,
                    ProgressEvent::new(job_id, format!("{}{}", STDERR_PREFIX, chunk)),
                )
                .await;
            }
            Err(e) => {
                debug!("Worker stderr read failed: {}", e);
                break;
            }
        }
    }

    if !pending.is_empty() {
        let chunk = String::from_utf8_lossy(&pending).into_owned();
        emit(
            &progress,
            ProgressEvent::new(job_id, format!("{}{}", STDERR_PREFIX, chunk)),
        )
        .await;
    }
}

/// The worker leads its own process group, so its pid doubles as the group id
#[cfg(unix)]
async fn kill_process_tree(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Safety: killpg only sends a signal; no memory is shared with the callee.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(
            "Failed to kill worker group {}: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(windows)]
async fn kill_process_tree(pid: u32) {
    let mut cmd = tokio::process::Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW);
    if let Err(e) = cmd.status().await {
        debug!("Failed to kill worker tree {}: {}", pid, e);
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_process_tree(_pid: u32) {}

/// Kills the worker along with anything it launched (e.g. the upscaler binary)
async fn kill_worker(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_tree(pid).await;
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to kill worker {:?}: {}", pid, e);
    }
}

/// Runs worker processes for image jobs, one process per call
#[derive(Clone)]
pub struct WorkerSupervisor {
    locator: Arc<dyn WorkerLocator>,
    timeout: Duration,
    success_marker: SuccessMarker,
}

impl WorkerSupervisor {
    pub fn new(locator: Arc<dyn WorkerLocator>) -> Self {
        Self {
            locator,
            timeout: DEFAULT_JOB_TIMEOUT,
            success_marker: SuccessMarker::default(),
        }
    }

    pub fn from_settings(locator: Arc<dyn WorkerLocator>, settings: &Settings) -> Self {
        Self::new(locator)
            .with_timeout(Duration::from_secs(settings.job_timeout_secs.max(1)))
            .with_success_marker(settings.success_marker)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_success_marker(mut self, rule: SuccessMarker) -> Self {
        self.success_marker = rule;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn locate_worker(&self) -> BridgeResult<WorkerCommand> {
        self.locator.locate()
    }

    /// Runs the worker for `request` to completion and returns the output path.
    ///
    /// The child is killed on timeout, on cancellation, and if this future is
    /// dropped early.
    pub async fn execute(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        progress: Option<mpsc::Sender<ProgressEvent>>,
        cancel: CancelToken,
    ) -> BridgeResult<String> {
        let output_path = output_path_for(request);

        let locator = Arc::clone(&self.locator);
        let worker = tokio::task::spawn_blocking(move || locator.locate())
            .await
            .map_err(|e| BridgeError::spawn(format!("Worker lookup task failed: {}", e)))??;
        worker.ensure_exists()?;

        let args = build_worker_args(request, &output_path);
        info!("Spawning worker: {:?} {}", worker.entry_point, args.join(" "));

        let mut cmd = worker.command();
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::spawn(format!("Failed to spawn worker process: {}", e)))?;

        let mut handle = JobHandle::new(job_id, child.id(), cancel);
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::spawn("Failed to capture worker stdout"))?;
        let stderr_task = child.stderr.take().map(|stderr| {
            AbortOnDrop(tokio::spawn(forward_stderr(stderr, job_id, progress.clone())))
        });

        let mut lines = BufReader::new(stdout).split(b'\n');
        let mut stdout_open = true;
        let mut exit_status: Option<ExitStatus> = None;
        let cancel = handle.cancel.clone();

        let termination = loop {
            if let (Some(status), false) = (exit_status, stdout_open) {
                break Termination::Exited(status);
            }

            tokio::select! {
                segment = lines.next_segment(), if stdout_open => match segment {
                    Ok(Some(raw)) => {
                        if let Some(line) = handle.record_line(&raw) {
                            debug!("[Worker] {}", line);
                            emit(&progress, ProgressEvent::new(handle.job_id, line)).await;
                        }
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        warn!("Worker stdout read failed: {}", e);
                        stdout_open = false;
                    }
                },
                status = child.wait(), if exit_status.is_none() => match status {
                    Ok(status) => {
                        exit_status = Some(status);
                        let drain_until = tokio::time::Instant::now() + EXIT_DRAIN_GRACE;
                        if drain_until < deadline.deadline() {
                            deadline.as_mut().reset(drain_until);
                        }
                    }
                    Err(e) => break Termination::WaitFailed(e),
                },
                _ = &mut deadline => match exit_status {
                    Some(status) => {
                        warn!("Worker stdout still open after exit, resolving with captured output");
                        break Termination::Exited(status);
                    }
                    None => break Termination::TimedOut,
                },
                _ = cancel.cancelled(), if exit_status.is_none() => break Termination::Cancelled,
            }
        };

        match termination {
            Termination::Exited(status) => {
                if let Some(mut task) = stderr_task {
                    if tokio::time::timeout(EXIT_DRAIN_GRACE, &mut task.0).await.is_err() {
                        debug!("Worker stderr still open after exit");
                    }
                }

                let exit_code = status.code();
                info!(
                    "Worker {:?} exited with code {:?} after {} ms",
                    handle.pid,
                    exit_code,
                    handle.elapsed_ms()
                );

                let seen = marker_seen(&handle.output, self.success_marker);
                JobResult::from_exit(exit_code, seen, handle.output, output_path).into_outcome()
            }
            Termination::TimedOut => {
                warn!(
                    "Worker {:?} exceeded {} ms, killing",
                    handle.pid,
                    self.timeout.as_millis()
                );
                kill_worker(&mut child, handle.pid).await;
                Err(BridgeError::Timeout {
                    elapsed_ms: handle.elapsed_ms(),
                })
            }
            Termination::Cancelled => {
                info!("Worker {:?} cancelled, killing", handle.pid);
                kill_worker(&mut child, handle.pid).await;
                Err(BridgeError::Cancelled)
            }
            Termination::WaitFailed(e) => {
                kill_worker(&mut child, handle.pid).await;
                Err(BridgeError::spawn(format!("Failed to wait for worker process: {}", e)))
            }
        }
    }
}
