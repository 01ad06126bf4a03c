// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle for periodic reader loops
//!
//! The frame reader runs its execution cycles on a dedicated thread, apart
//! from the selection thread. [`CaptureLoopController`] owns that thread and
//! stops it on request or on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the loop does after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Owner of one periodic cycle thread
///
/// ```ignore
/// let mut controller = CaptureLoopController::start_periodic(
///     "frame-reader",
///     Duration::from_millis(16),
///     move || match reader.execute(Some(&stream_id), &mut frame) {
///         Ok(_) => LoopAction::Continue,
///         Err(CycleError::SessionNotFound(_)) => LoopAction::Stop,
///         Err(_) => LoopAction::Continue,
///     },
/// );
///
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    label: String,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<u64>>,
}

impl CaptureLoopController {
    /// Run `cycle` at most once per `interval` until it asks to stop or the
    /// controller is stopped
    ///
    /// A cycle that overruns the interval is followed immediately by the next
    /// one; missed cycles are not replayed.
    pub fn start_periodic<F>(label: &str, interval: Duration, mut cycle: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let worker_label = label.to_string();

        info!(label, interval_ms = interval.as_millis() as u64, "Starting reader loop");

        let worker = thread::spawn(move || {
            let mut cycles = 0u64;
            let mut deadline = Instant::now();

            while !worker_cancel.load(Ordering::SeqCst) {
                cycles += 1;
                if cycle() == LoopAction::Stop {
                    debug!(label = %worker_label, cycles, "Cycle asked to stop");
                    break;
                }

                deadline += interval;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    deadline = now;
                }
            }

            info!(label = %worker_label, cycles, "Reader loop exiting");
            cycles
        });

        Self {
            label: label.to_string(),
            cancel,
            worker: Some(worker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Flag that stops the loop when set, e.g. from a Ctrl-C handler
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ask the loop to stop without waiting for it
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Ask the loop to stop and wait for the thread
    ///
    /// Returns the number of cycles run.
    pub fn stop(&mut self) -> u64 {
        self.request_stop();
        self.join()
    }

    /// Wait for the loop to end on its own or through the stop signal
    ///
    /// Returns the number of cycles run; zero once already joined.
    pub fn join(&mut self) -> u64 {
        let Some(worker) = self.worker.take() else {
            return 0;
        };
        match worker.join() {
            Ok(cycles) => cycles,
            Err(_) => {
                warn!(label = %self.label, "Reader loop thread panicked");
                0
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!(label = %self.label, "Controller dropped with loop running");
            self.stop();
        }
    }
}
