//! Background capture worker.
//!
//! One named thread owns a [`ScreenshotCapturer`] and serves capture requests
//! in arrival order. Results go back through a caller-supplied notifier, which
//! in the desktop shell posts them onto the event loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::{CaptureError, CaptureOutcome, NoImageReason, ScreenshotCapturer};

/// Completion of one capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCompleted {
    /// Reveal cycle that requested the capture.
    pub cycle: u64,
    /// Capture result.
    pub outcome: CaptureOutcome,
}

enum WorkerCommand {
    Capture { cycle: u64 },
    Shutdown,
}

/// Handle to the capture thread. Dropping it stops and joins the thread.
pub struct CaptureWorker {
    command_tx: Sender<WorkerCommand>,
    worker_join: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Spawns the worker thread.
    ///
    /// # Errors
    /// Returns [`CaptureError::Worker`] when the OS refuses to start a thread.
    pub fn spawn<N>(capturer: ScreenshotCapturer, notify: N) -> Result<Self, CaptureError>
    where
        N: Fn(CaptureCompleted) + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();

        let worker_join = std::thread::Builder::new()
            .name("leonel-quick-capture".to_string())
            .spawn(move || {
                while let Ok(command) = command_rx.recv() {
                    match command {
                        WorkerCommand::Capture { cycle } => {
                            let started = Instant::now();
                            let outcome = catch_unwind(AssertUnwindSafe(|| capturer.capture()))
                                .unwrap_or_else(|_| {
                                    error!(event = "capture.panic", cycle, "capture panicked");
                                    CaptureOutcome::NoImage(NoImageReason::Failed(
                                        "capture panicked".to_string(),
                                    ))
                                });
                            debug!(
                                event = "capture.completed",
                                cycle,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                has_image = matches!(outcome, CaptureOutcome::Image(_)),
                                "capture finished"
                            );
                            notify(CaptureCompleted { cycle, outcome });
                        }
                        WorkerCommand::Shutdown => break,
                    }
                }
            })
            .map_err(|error| CaptureError::Worker(format!("failed to spawn thread: {error}")))?;

        info!(event = "capture.worker_spawned", "capture worker started");
        Ok(Self {
            command_tx,
            worker_join: Some(worker_join),
        })
    }

    /// Queues a capture for `cycle`. Returns immediately.
    ///
    /// # Errors
    /// Returns [`CaptureError::Worker`] when the thread has exited.
    pub fn request(&self, cycle: u64) -> Result<(), CaptureError> {
        self.command_tx
            .send(WorkerCommand::Capture { cycle })
            .map_err(|error| CaptureError::Worker(format!("worker send failed: {error}")))
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(join) = self.worker_join.take() {
            let _ = join.join();
            info!(event = "capture.worker_joined", "capture worker stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for worker ordering and delivery.

    use std::sync::Arc;
    use std::time::Duration;

    use leonel_quick_permission::{ScreenCaptureAuthorization, StaticPermissionProbe};

    use super::*;
    use crate::SyntheticSourceProvider;

    #[test]
    fn worker_delivers_completions_in_request_order() {
        let capturer = ScreenshotCapturer::new(
            Arc::new(StaticPermissionProbe::new(ScreenCaptureAuthorization::Granted)),
            Arc::new(SyntheticSourceProvider::new()),
        );
        let (tx, rx) = mpsc::channel();
        let worker = CaptureWorker::spawn(capturer, move |completed| {
            let _ = tx.send(completed);
        })
        .expect("worker should spawn");

        worker.request(1).expect("request 1");
        worker.request(2).expect("request 2");

        let first = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("first completion");
        let second = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("second completion");
        assert_eq!(first.cycle, 1);
        assert_eq!(second.cycle, 2);
        assert!(matches!(first.outcome, CaptureOutcome::Image(_)));
    }

    #[test]
    fn dropping_worker_joins_thread() {
        let capturer = ScreenshotCapturer::new(
            Arc::new(StaticPermissionProbe::new(ScreenCaptureAuthorization::Denied)),
            Arc::new(SyntheticSourceProvider::new()),
        );
        let worker = CaptureWorker::spawn(capturer, |_| {}).expect("worker should spawn");
        worker.request(1).expect("request");
        drop(worker);
    }
}
