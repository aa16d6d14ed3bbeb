//! Execution orchestration
//!
//! One [`Executor::run`] call wires the capture scope around a worker
//! thread, bounds the wait with the [`TimeoutController`], and folds every
//! failure mode (syntax errors, runtime exceptions, timeouts, lost workers)
//! into the returned [`ExecutionResult`]'s error stream. It never returns
//! an error to the caller for script-originated failures.
//!
//! Memory containment is the caller's concern: run
//! [`crate::ResourceLimiter::monitor`] (or `configure`) process-wide
//! alongside the executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::capture::{self, OutputCapture, Stream};
use crate::engine::ScriptEngine;
use crate::limits::ResourceLimits;
use crate::timeout::{TimeoutController, WaitOutcome};
use crate::types::{ExecutionId, ExecutionRequest, ExecutionResult};

/// Grace window granted to interruptible engines after the budget expires
const CANCEL_GRACE: Duration = Duration::from_millis(100);

/// Runs scripts through a [`ScriptEngine`] under enforced budgets
pub struct Executor {
    engine: Arc<dyn ScriptEngine>,
    limits: ResourceLimits,
}

impl Executor {
    /// Create an executor with the default limits
    pub fn new(engine: impl ScriptEngine + 'static) -> Self {
        Self::with_limits(engine, ResourceLimits::default())
    }

    pub fn with_limits(engine: impl ScriptEngine + 'static, limits: ResourceLimits) -> Self {
        Self {
            engine: Arc::new(engine),
            limits,
        }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Run a script under this executor's default budgets
    pub fn run_script(&self, script: &str) -> ExecutionResult {
        let request = ExecutionRequest::new(script)
            .with_time_budget(self.limits.time_budget)
            .with_memory_budget(self.limits.memory_budget_bytes);
        self.run(&request)
    }

    /// Execute one request and always return a populated result
    pub fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let id = ExecutionId::new();
        tracing::info!(
            execution_id = %id,
            engine = self.engine.name(),
            script_len = request.script.len(),
            "executing script"
        );

        // Single-flight: at most one execution may hold the redirected
        // process-wide output state at a time.
        let _serial = capture::lock_execution();

        let output = OutputCapture::new(self.limits.max_output_bytes);
        let cancel = output.cancel_token();

        let scope = match output.activate() {
            Ok(scope) => scope,
            Err(err) => {
                // Unreachable while the execution lock is held; folded into
                // the result rather than surfaced as an error.
                let mut result = output.into_result();
                result
                    .stderr
                    .push_str(&format!("ERROR: internal capture failure: {err}\n"));
                return result;
            }
        };

        let (done_tx, done_rx) = mpsc::channel();
        let abandoned = Arc::new(AtomicBool::new(false));
        let generation = scope.generation();

        let spawned = {
            let engine = Arc::clone(&self.engine);
            let script = request.script.clone();
            let abandoned = Arc::clone(&abandoned);
            thread::Builder::new()
                .name("pyground-worker".into())
                .spawn(move || {
                    capture::bind_worker(generation);
                    if let Err(fault) = engine.eval(&script) {
                        // Lands on the captured stderr while the scope is
                        // still active; discarded once it has exited.
                        let _ = capture::write_output(Stream::Stderr, &fault.diagnostic());
                    }
                    let _ = done_tx.send(());
                    if abandoned.load(Ordering::SeqCst) {
                        tracing::debug!("abandoned worker finished late");
                    }
                })
        };

        let outcome = match spawned {
            // The join handle is dropped: a timed-out worker is abandoned,
            // never joined or killed.
            Ok(_handle) => {
                let controller = if self.engine.interruptible() {
                    TimeoutController::cooperative(request.time_budget, CANCEL_GRACE)
                } else {
                    TimeoutController::polling(request.time_budget)
                };
                controller.wait(&done_rx, &cancel)
            }
            Err(err) => {
                tracing::error!(execution_id = %id, error = %err, "failed to spawn execution worker");
                WaitOutcome::WorkerLost
            }
        };

        if outcome == WaitOutcome::TimedOut {
            abandoned.store(true, Ordering::SeqCst);
        }

        // Restore the process-wide streams before reading the buffers; late
        // writes from an abandoned worker no longer have a target.
        drop(scope);

        let mut result = output.into_result();
        match outcome {
            WaitOutcome::Completed => {}
            WaitOutcome::TimedOut => {
                result.stderr.push_str(&format!(
                    "ERROR: execution timed out after {} seconds\n",
                    format_seconds(request.time_budget)
                ));
            }
            WaitOutcome::WorkerLost => {
                result
                    .stderr
                    .push_str("ERROR: execution worker terminated unexpectedly\n");
            }
        }

        tracing::info!(
            execution_id = %id,
            timed_out = outcome == WaitOutcome::TimedOut,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            figures = result.figures.len(),
            "execution finished"
        );
        result
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}
