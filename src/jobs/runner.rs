//! Single-flight job runner
//!
//! State machine: `Idle -> Running -> Idle`. Each finished job produces one
//! [`Completion`], returned from [`JobRunner::poll`] on the polling thread,
//! and the runner is `Idle` again by the time the caller sees it. A second
//! submission while running is refused with `Busy`, never queued.

use super::request::{SynthesisMode, SynthesisRequest};
use crate::speech::{Backend, Engine, StopHandle};
use crate::{Result, VoxError};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempPath;

/// How often [`JobRunner::wait_for_completion`] re-polls
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
}

/// Result of one job, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job_id: u64,
    pub success: bool,
    pub detail: String,

    /// Written file, for successful renders
    pub output: Option<PathBuf>,

    /// Properties the engine refused; the job went ahead without them
    pub rejected: Vec<String>,
}

impl Completion {
    fn failure(job_id: u64, detail: impl Into<String>) -> Self {
        Self {
            job_id,
            success: false,
            detail: detail.into(),
            output: None,
            rejected: Vec::new(),
        }
    }
}

/// Something the UI should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    Completed(Completion),
    /// The running job has passed the slow-job threshold; sent once per job
    StillWorking { job_id: u64, elapsed: Duration },
}

/// Message from a worker thread
struct WorkerReport {
    job_id: u64,
    result: Result<()>,
    rejected: Vec<String>,
}

/// Where a job's worker has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the engine lock or applying properties
    Preparing,
    /// Inside the backend's speak or render call
    Synthesizing,
    Cancelled,
}

/// Cancellation shared between one job's worker and the runner
///
/// The engine's stop handle is engine-wide, so it only fires while this
/// job is the one synthesizing. Before that, cancelling just keeps the
/// worker from ever reaching the backend.
#[derive(Clone)]
struct JobControl {
    phase: Arc<Mutex<Phase>>,
    engine_stop: StopHandle,
}

impl JobControl {
    fn new(engine_stop: StopHandle) -> Self {
        Self {
            phase: Arc::new(Mutex::new(Phase::Preparing)),
            engine_stop,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_cancelled(&self) -> bool {
        *self.lock() == Phase::Cancelled
    }

    /// Enter the backend call; false if the job was cancelled first
    fn begin_synthesis(&self) -> bool {
        let mut phase = self.lock();
        if *phase == Phase::Cancelled {
            return false;
        }
        *phase = Phase::Synthesizing;
        true
    }

    /// Cancel the job, stopping the engine only if it is working for us
    fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.lock(), Phase::Cancelled);
        if previous == Phase::Synthesizing {
            self.engine_stop.stop();
        }
    }

    /// Keep a job that has not started synthesizing from ever starting
    fn detach(&self) {
        let mut phase = self.lock();
        if *phase == Phase::Preparing {
            *phase = Phase::Cancelled;
        }
    }
}

struct RunningJob {
    id: u64,
    mode: SynthesisMode,
    started: Instant,
    control: JobControl,
    warned: bool,
    handle: Option<JoinHandle<()>>,
}

pub struct JobRunner {
    current: Option<RunningJob>,
    next_id: u64,
    tx: Sender<WorkerReport>,
    rx: Receiver<WorkerReport>,
    pending: VecDeque<RunnerEvent>,
    still_working_after: Option<Duration>,
}

impl JobRunner {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            current: None,
            next_id: 1,
            tx,
            rx,
            pending: VecDeque::new(),
            still_working_after: None,
        }
    }

    /// Emit [`RunnerEvent::StillWorking`] once a job runs longer than `after`
    pub fn with_still_working_after(mut self, after: Duration) -> Self {
        self.still_working_after = Some(after);
        self
    }

    pub fn state(&self) -> JobState {
        if self.current.is_some() {
            JobState::Running
        } else {
            JobState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_job(&self) -> Option<u64> {
        self.current.as_ref().map(|job| job.id)
    }

    /// How long the running job has been going
    pub fn elapsed(&self) -> Option<Duration> {
        self.current.as_ref().map(|job| job.started.elapsed())
    }

    /// Start a job on its own worker thread
    ///
    /// Fails with `Busy` while another job is running; the running job is
    /// not touched. On success the runner is `Running` before this returns.
    pub fn submit(
        &mut self,
        engine: &Engine,
        request: SynthesisRequest,
        mode: SynthesisMode,
    ) -> Result<u64> {
        if let Some(ref job) = self.current {
            debug!("Rejecting submission while job {} runs", job.id);
            return Err(VoxError::Busy);
        }

        let job_id = self.next_id;
        self.next_id += 1;
        info!("Starting job {} ({}) on {} engine", job_id, mode, engine.name());

        let control = JobControl::new(engine.stop_handle());
        let worker_control = control.clone();
        let worker_engine = engine.clone();
        let worker_mode = mode.clone();
        let tx = self.tx.clone();
        let handle = thread::Builder::new()
            .name(format!("synthesis-job-{}", job_id))
            .spawn(move || {
                match run_job(&worker_engine, &worker_control, &request, &worker_mode) {
                    Some((result, rejected)) => {
                        let _ = tx.send(WorkerReport {
                            job_id,
                            result,
                            rejected,
                        });
                    }
                    None => debug!("Job {} cancelled before synthesis", job_id),
                }
            })
            .map_err(|e| VoxError::BackendRuntime(format!("could not start worker: {}", e)))?;

        self.current = Some(RunningJob {
            id: job_id,
            mode,
            started: Instant::now(),
            control,
            warned: false,
            handle: Some(handle),
        });
        Ok(job_id)
    }

    /// Next event for the UI, without blocking
    pub fn poll(&mut self) -> Option<RunnerEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        let finished = self
            .current
            .as_ref()
            .and_then(|job| job.handle.as_ref())
            .map(|h| h.is_finished())
            .unwrap_or(false);

        loop {
            match self.rx.try_recv() {
                Ok(report) => {
                    if self.current_job() == Some(report.job_id) {
                        return Some(RunnerEvent::Completed(self.finish(report)));
                    }
                    debug!("Discarding result of detached job {}", report.job_id);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if finished {
            // The worker exited without reporting, which only happens on panic
            if let Some(job) = self.current.take() {
                warn!("Worker for job {} exited without a result", job.id);
                return Some(RunnerEvent::Completed(Completion::failure(
                    job.id,
                    "synthesis worker stopped unexpectedly",
                )));
            }
        }

        let threshold = self.still_working_after?;
        let job = self.current.as_mut()?;
        let elapsed = job.started.elapsed();
        if !job.warned && elapsed >= threshold {
            job.warned = true;
            return Some(RunnerEvent::StillWorking {
                job_id: job.id,
                elapsed,
            });
        }
        None
    }

    /// Poll until a completion arrives or `timeout` passes
    ///
    /// `StillWorking` events seen meanwhile are dropped.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Option<Completion> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(RunnerEvent::Completed(completion)) = self.poll() {
                return Some(completion);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Stop the running job
    ///
    /// A job still waiting for the engine never reaches it; one already
    /// synthesizing gets a best-effort engine stop. Either way the runner
    /// returns to `Idle` at once and queues a failed completion. Whatever
    /// the worker reports later is discarded. Returns `false`, with no
    /// event, when idle.
    pub fn stop(&mut self) -> bool {
        match self.current.take() {
            Some(job) => {
                info!("Stopping job {}", job.id);
                job.control.cancel();
                self.pending
                    .push_back(RunnerEvent::Completed(Completion::failure(job.id, "stopped by user")));
                true
            }
            None => false,
        }
    }

    /// Detach a stuck job without signalling the engine
    ///
    /// The worker keeps the engine locked until the backend call returns, so
    /// callers should open a fresh engine for the next job. A job that had
    /// not reached the backend yet is dropped before it does.
    pub fn abandon(&mut self) -> bool {
        match self.current.take() {
            Some(job) => {
                job.control.detach();
                warn!(
                    "Abandoning job {} after {:?}",
                    job.id,
                    job.started.elapsed()
                );
                self.pending.push_back(RunnerEvent::Completed(Completion::failure(
                    job.id,
                    "abandoned; the speech engine may still be busy",
                )));
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, report: WorkerReport) -> Completion {
        let job = self.current.take();
        let mode = job.as_ref().map(|j| j.mode.clone());
        let elapsed = job.map(|j| j.started.elapsed()).unwrap_or_default();

        match report.result {
            Ok(()) => {
                info!("Job {} finished in {:?}", report.job_id, elapsed);
                let (detail, output) = match mode {
                    Some(SynthesisMode::RenderToFile(path)) => {
                        (format!("Saved audio to {}", path.display()), Some(path))
                    }
                    _ => ("Finished speaking".to_string(), None),
                };
                Completion {
                    job_id: report.job_id,
                    success: true,
                    detail,
                    output,
                    rejected: report.rejected,
                }
            }
            Err(e) => {
                warn!("Job {} failed: {}", report.job_id, e);
                Completion {
                    rejected: report.rejected,
                    ..Completion::failure(report.job_id, e.to_string())
                }
            }
        }
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        if let Some(job) = self.current.take() {
            debug!("Stopping job {} on shutdown", job.id);
            job.control.cancel();
        }
    }
}

/// Worker body: configure the engine, then synthesize, all under one lock
///
/// Returns `None` without touching the backend further once the job has
/// been cancelled.
fn run_job(
    engine: &Engine,
    control: &JobControl,
    request: &SynthesisRequest,
    mode: &SynthesisMode,
) -> Option<(Result<()>, Vec<String>)> {
    let mut backend = engine.lock();
    let mut rejected = Vec::new();

    if control.is_cancelled() {
        return None;
    }
    tolerate(&mut rejected, "rate", backend.set_rate(request.rate_wpm()));

    if control.is_cancelled() {
        return None;
    }
    tolerate(&mut rejected, "volume", backend.set_volume(request.volume()));

    if let Some(id) = request.voice_id() {
        if control.is_cancelled() {
            return None;
        }
        tolerate(&mut rejected, "voice", backend.set_voice(id));
    }

    if !control.begin_synthesis() {
        return None;
    }
    let result = match mode {
        SynthesisMode::Speak => backend.speak(request.text()),
        SynthesisMode::RenderToFile(path) => render(&mut **backend, request.text(), path),
    };
    Some((result, rejected))
}

/// Property failures never end a job; they are logged and collected
fn tolerate(rejected: &mut Vec<String>, property: &str, result: Result<()>) {
    if let Err(e) = result {
        let e = match e {
            VoxError::ConfigPropertyRejected { .. } => e,
            other => VoxError::ConfigPropertyRejected {
                property: property.to_string(),
                detail: other.to_string(),
            },
        };
        warn!("{}; continuing", e);
        rejected.push(e.to_string());
    }
}

/// Render into a scratch file beside `path`, then move it into place
///
/// Some engines silently do nothing when no audio backend is installed, so
/// a missing or zero-byte file is an error even after a clean return. On
/// any failure the scratch file is deleted and `path` is left as it was.
fn render(backend: &mut dyn Backend, text: &str, path: &Path) -> Result<()> {
    let scratch = scratch_file_for(path)?;
    debug!("Rendering to scratch file {:?}", &*scratch);

    backend.render_to_file(text, &scratch)?;

    match fs::metadata(&scratch) {
        Ok(meta) if meta.len() > 0 => {}
        _ => return Err(VoxError::SynthesisProducedNoOutput),
    }

    scratch.persist(path).map_err(|e| VoxError::Io(e.error))?;
    Ok(())
}

/// Closed, self-deleting file in the target's directory with its extension
///
/// Backends pick the audio format from the extension, and the same
/// directory keeps the final rename on one filesystem.
fn scratch_file_for(path: &Path) -> Result<TempPath> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix(".voxnova-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}
