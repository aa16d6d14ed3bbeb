//! Process-wide output capture
//!
//! The interpreter's output streams and the visualization hook are
//! process-wide state: at most one execution may have them redirected at a
//! time. [`OutputCapture::activate`] installs the redirection into a global
//! slot and the returned [`CaptureScope`] restores it on drop, whether the
//! run succeeded, faulted, or timed out.
//!
//! Worker threads are bound to the generation of the capture they serve.
//! A worker abandoned after a timeout keeps its stale generation, so its
//! late writes are discarded instead of leaking into a later execution's
//! capture.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::figure::Figure;
use crate::types::ExecutionResult;

/// Buffers for one execution's observable output
#[derive(Debug, Default)]
pub struct CapturedOutput {
    stdout: String,
    stderr: String,
    figures: Vec<String>,
    stdout_truncated: bool,
    stderr_truncated: bool,
}

impl CapturedOutput {
    fn append(&mut self, stream: Stream, text: &str, max_bytes: usize) {
        let (buffer, truncated) = match stream {
            Stream::Stdout => (&mut self.stdout, &mut self.stdout_truncated),
            Stream::Stderr => (&mut self.stderr, &mut self.stderr_truncated),
        };
        if *truncated {
            return;
        }
        let remaining = max_bytes.saturating_sub(buffer.len());
        if text.len() <= remaining {
            buffer.push_str(text);
        } else {
            let mut cut = remaining;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            buffer.push_str(&text[..cut]);
            buffer.push_str("\n[output truncated]\n");
            *truncated = true;
        }
    }
}

/// The two redirected text streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Another execution already holds the redirected state
    #[error("another capture scope is already active")]
    AlreadyActive,

    /// The owning execution's cancellation token was set
    #[error("execution cancelled")]
    Cancelled,
}

/// Cancellation token shared between the executor and the capture sink.
///
/// Once set, sink writes from the owning execution fail with
/// [`CaptureError::Cancelled`], giving the engine an interruptible point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ActiveCapture {
    generation: u64,
    buffers: Arc<Mutex<CapturedOutput>>,
    figure: Mutex<Figure>,
    cancel: CancelToken,
    max_output_bytes: usize,
}

/// The process-wide capture slot
static ACTIVE: Mutex<Option<Arc<ActiveCapture>>> = Mutex::new(None);

/// Serializes executions: at most one capture may be installed at a time
static EXECUTION_LOCK: Mutex<()> = Mutex::new(());

static GENERATION: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Generation of the capture this thread serves; 0 means unbound
    static WORKER_GENERATION: Cell<u64> = const { Cell::new(0) };
}

pub(crate) fn lock_execution() -> MutexGuard<'static, ()> {
    lock_unpoisoned(&EXECUTION_LOCK)
}

/// Bind the current thread to a capture generation. Called once at the top
/// of each worker thread.
pub(crate) fn bind_worker(generation: u64) {
    WORKER_GENERATION.with(|cell| cell.set(generation));
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The active capture, provided the calling thread is allowed to reach it
fn active_for_caller() -> Option<Arc<ActiveCapture>> {
    let active = lock_unpoisoned(&ACTIVE).clone()?;
    let bound = WORKER_GENERATION.with(|cell| cell.get());
    if bound != 0 && bound != active.generation {
        // A worker from an earlier, abandoned execution: no valid target.
        return None;
    }
    Some(active)
}

/// Write to the redirected stream of the active capture.
///
/// Writes with no valid target (no capture installed, or a stale worker) are
/// discarded. Returns [`CaptureError::Cancelled`] once the owning
/// execution's deadline has passed.
pub fn write_output(stream: Stream, text: &str) -> Result<(), CaptureError> {
    let Some(active) = active_for_caller() else {
        return Ok(());
    };
    if active.cancel.is_set() {
        return Err(CaptureError::Cancelled);
    }
    lock_unpoisoned(&active.buffers).append(stream, text, active.max_output_bytes);
    Ok(())
}

/// Append a line series to the figure under construction
pub fn add_series(points: Vec<(f64, f64)>) -> Result<(), CaptureError> {
    let Some(active) = active_for_caller() else {
        return Ok(());
    };
    if active.cancel.is_set() {
        return Err(CaptureError::Cancelled);
    }
    lock_unpoisoned(&active.figure).add_series(points);
    Ok(())
}

/// Discard the figure under construction and start a fresh one
pub fn reset_figure() {
    if let Some(active) = active_for_caller() {
        *lock_unpoisoned(&active.figure) = Figure::default();
    }
}

/// Serialize the figure under construction and append it to the captured
/// figure list. The figure is consumed either way; a serialization failure
/// is recorded on the captured stderr and the figure is skipped.
pub fn emit_figure() -> Result<(), CaptureError> {
    let Some(active) = active_for_caller() else {
        return Ok(());
    };
    if active.cancel.is_set() {
        return Err(CaptureError::Cancelled);
    }
    let figure = std::mem::take(&mut *lock_unpoisoned(&active.figure));
    match figure.to_base64_png() {
        Ok(encoded) => {
            lock_unpoisoned(&active.buffers).figures.push(encoded);
        }
        Err(err) => {
            tracing::warn!(error = %err, "figure serialization failed, skipping figure");
            lock_unpoisoned(&active.buffers).append(
                Stream::Stderr,
                &format!("ERROR: figure rendering failed: {err}\n"),
                active.max_output_bytes,
            );
        }
    }
    Ok(())
}

/// Capture of one execution's output
pub struct OutputCapture {
    buffers: Arc<Mutex<CapturedOutput>>,
    cancel: CancelToken,
    max_output_bytes: usize,
}

impl OutputCapture {
    pub fn new(max_output_bytes: usize) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(CapturedOutput::default())),
            cancel: CancelToken::new(),
            max_output_bytes,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Redirect the process-wide streams and visualization hook into this
    /// capture. Fails if another capture is already installed.
    pub fn activate(&self) -> Result<CaptureScope, CaptureError> {
        let mut slot = lock_unpoisoned(&ACTIVE);
        if slot.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let generation = GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(Arc::new(ActiveCapture {
            generation,
            buffers: Arc::clone(&self.buffers),
            figure: Mutex::new(Figure::default()),
            cancel: self.cancel.clone(),
            max_output_bytes: self.max_output_bytes,
        }));
        Ok(CaptureScope { generation })
    }

    /// Consume the capture into the terminal result snapshot
    pub fn into_result(self) -> ExecutionResult {
        let mut buffers = lock_unpoisoned(&self.buffers);
        let taken = std::mem::take(&mut *buffers);
        ExecutionResult {
            stdout: taken.stdout,
            stderr: taken.stderr,
            figures: taken.figures,
        }
    }
}

/// RAII guard for the process-wide redirection. Dropping it restores the
/// previous (empty) state unconditionally.
pub struct CaptureScope {
    generation: u64,
}

impl CaptureScope {
    /// Generation tag worker threads bind to
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        *lock_unpoisoned(&ACTIVE) = None;
    }
}
