//! Time-bounded waiting on execution workers
//!
//! A worker that misses its budget is abandoned, never forcibly killed: it
//! keeps running detached until it finishes on its own or the process-wide
//! memory monitor intervenes. Under sustained timeout load abandoned workers
//! accumulate; the process-wide counter and the warning emitted on every
//! abandonment make that build-up visible to operators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::capture::CancelToken;

static ABANDONED_WORKERS: AtomicUsize = AtomicUsize::new(0);

/// Total number of workers abandoned after a timeout since process start
pub fn abandoned_workers() -> usize {
    ABANDONED_WORKERS.load(Ordering::Relaxed)
}

/// Outcome of waiting on a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The worker signalled completion within budget
    Completed,

    /// The budget expired; the worker was abandoned
    TimedOut,

    /// The worker went away without signalling (panic or spawn failure)
    WorkerLost,
}

/// Bounds the wait for a worker's completion signal.
///
/// Two strategies, selected by the engine's cancellation capability:
/// cooperative (on expiry, set the cancellation token so the engine can stop
/// at its next interruptible point, then wait a short grace window) and
/// polling (plain bounded wait, abandon immediately on expiry).
#[derive(Debug, Clone)]
pub struct TimeoutController {
    budget: Duration,
    grace: Option<Duration>,
}

impl TimeoutController {
    /// Cooperative strategy for engines that observe the cancellation token
    pub fn cooperative(budget: Duration, grace: Duration) -> Self {
        Self {
            budget,
            grace: Some(grace),
        }
    }

    /// Polling strategy: the cross-platform baseline
    pub fn polling(budget: Duration) -> Self {
        Self {
            budget,
            grace: None,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Wait for the worker to signal completion on `done`.
    ///
    /// On expiry the cancellation token is always set, so even an abandoned
    /// worker stops at its next interruptible point if it has one.
    pub fn wait(&self, done: &Receiver<()>, cancel: &CancelToken) -> WaitOutcome {
        match done.recv_timeout(self.budget) {
            Ok(()) => WaitOutcome::Completed,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::WorkerLost,
            Err(RecvTimeoutError::Timeout) => {
                cancel.set();
                let ended = match self.grace {
                    Some(grace) => !matches!(
                        done.recv_timeout(grace),
                        Err(RecvTimeoutError::Timeout)
                    ),
                    None => false,
                };
                if ended {
                    tracing::debug!(
                        budget_secs = self.budget.as_secs_f64(),
                        "worker stopped cooperatively after its budget expired"
                    );
                } else {
                    let total = ABANDONED_WORKERS.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        budget_secs = self.budget.as_secs_f64(),
                        abandoned_total = total,
                        "time budget exceeded; worker abandoned and left running"
                    );
                }
                WaitOutcome::TimedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_completion_within_budget() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        let controller = TimeoutController::polling(Duration::from_millis(100));
        assert_eq!(controller.wait(&rx, &CancelToken::new()), WaitOutcome::Completed);
    }

    #[test]
    fn test_expiry_sets_cancel_and_times_out() {
        let (_tx, rx) = mpsc::channel::<()>();
        let cancel = CancelToken::new();
        let controller = TimeoutController::polling(Duration::from_millis(50));
        let before = abandoned_workers();
        let started = Instant::now();
        assert_eq!(controller.wait(&rx, &cancel), WaitOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(cancel.is_set());
        assert!(abandoned_workers() > before);
    }

    #[test]
    fn test_lost_worker_is_detected() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        let controller = TimeoutController::polling(Duration::from_millis(50));
        assert_eq!(
            controller.wait(&rx, &CancelToken::new()),
            WaitOutcome::WorkerLost
        );
    }

    #[test]
    fn test_cooperative_stop_is_not_counted_abandoned() {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            while !worker_cancel.is_set() {
                thread::sleep(Duration::from_millis(5));
            }
            let _ = tx.send(());
        });

        let controller =
            TimeoutController::cooperative(Duration::from_millis(50), Duration::from_millis(2000));
        let started = Instant::now();
        assert_eq!(controller.wait(&rx, &cancel), WaitOutcome::TimedOut);
        // The worker reacted to cancellation well inside the grace window.
        assert!(started.elapsed() < Duration::from_millis(1500));
    }
}
