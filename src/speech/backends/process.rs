//! Cancellable child processes for command-line speech engines
//!
//! espeak-ng, `say` and PowerShell all synthesize by running a process to
//! completion. The child lives in a shared slot so a [`StopHandle`] can kill
//! it while the worker thread is waiting on it.

use crate::speech::StopHandle;
use crate::{Result, VoxError};
use log::{debug, warn};
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// How often a waiting worker checks whether the child has exited
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Slot holding the currently running synthesis process
#[derive(Clone, Default)]
pub struct ProcessSlot {
    child: Arc<Mutex<Option<Child>>>,
    cancelled: Arc<AtomicBool>,
}

impl ProcessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Kill whatever is running in the slot
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.lock().take() {
            debug!("Killing synthesis process {}", child.id());
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait();
                }
                Err(e) => debug!("Failed to kill synthesis process: {}", e),
            }
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        let slot = self.clone();
        StopHandle::new(move || slot.cancel())
    }

    /// Run `cmd` to completion, feeding `input` on stdin
    ///
    /// Returns `Ok` both on a clean exit and when the run was cancelled
    /// through the slot. A non-zero exit otherwise becomes `BackendRuntime`
    /// carrying the process's stderr.
    pub fn run(&self, mut cmd: Command, input: Option<&str>) -> Result<()> {
        self.cancelled.store(false, Ordering::SeqCst);

        let program = cmd.get_program().to_string_lossy().into_owned();
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            VoxError::BackendRuntime(format!("Failed to start {}: {}", program, e))
        })?;
        debug!("{} started with PID {}", program, child.id());

        let stdin = child.stdin.take();
        let mut stderr = child.stderr.take();
        *self.lock() = Some(child);

        if let (Some(mut stdin), Some(text)) = (stdin, input) {
            // Dropping stdin afterwards signals end of text
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                if e.kind() != ErrorKind::BrokenPipe {
                    warn!("Failed to write text to {}: {}", program, e);
                }
            }
        }

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!("{} cancelled", program);
                return Ok(());
            }

            let status = {
                let mut slot = self.lock();
                let status = match slot.as_mut() {
                    Some(child) => child.try_wait()?,
                    // Taken by cancel()
                    None => return Ok(()),
                };
                if status.is_some() {
                    slot.take();
                }
                status
            };

            match status {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    let mut message = String::new();
                    if let Some(ref mut err) = stderr {
                        let _ = err.read_to_string(&mut message);
                    }
                    return Err(VoxError::BackendRuntime(format!(
                        "{} exited with {}: {}",
                        program,
                        status,
                        message.trim()
                    )));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    /// Run `cmd` and capture its stdout, for voice enumeration
    pub fn capture(mut cmd: Command) -> Result<String> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VoxError::BackendRuntime(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxError::BackendRuntime(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_run_success() {
        let slot = ProcessSlot::new();
        assert!(slot.run(Command::new("true"), None).is_ok());
    }

    #[test]
    fn test_run_failure_reports_backend_error() {
        let slot = ProcessSlot::new();
        let err = slot.run(Command::new("false"), None).unwrap_err();
        assert!(matches!(err, VoxError::BackendRuntime(_)));
    }

    #[test]
    fn test_run_feeds_stdin() {
        let slot = ProcessSlot::new();
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("read line; test \"$line\" = hello");
        assert!(slot.run(cmd, Some("hello\n")).is_ok());
    }

    #[test]
    fn test_cancel_interrupts_long_run() {
        let slot = ProcessSlot::new();
        let stop = slot.stop_handle();
        let worker = {
            let slot = slot.clone();
            thread::spawn(move || {
                let mut cmd = Command::new("sleep");
                cmd.arg("30");
                slot.run(cmd, None)
            })
        };

        thread::sleep(Duration::from_millis(200));
        let started = Instant::now();
        stop.stop();
        let result = worker.join().unwrap();
        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_capture_stdout() {
        let mut cmd = Command::new("echo");
        cmd.arg("voices");
        assert_eq!(ProcessSlot::capture(cmd).unwrap().trim(), "voices");
    }
}
