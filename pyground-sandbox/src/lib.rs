//! Pyground sandbox - bounded execution of untrusted Python scripts
//!
//! Takes a script string and a resource budget, runs the script on a
//! dedicated worker thread under enforced limits, captures its stdout,
//! stderr, and emitted figures, and returns a structured result. Script
//! faults, timeouts, and worker failures are folded into the result's error
//! stream, so the caller always gets a result back.
//!
//! This is best-effort containment for cooperative, accidentally-buggy
//! scripts: time and memory budgets only, no syscall filtering and no
//! filesystem or network isolation.

pub mod capture;
mod engine;
mod executor;
mod figure;
mod limits;
mod timeout;
mod types;

pub use capture::{CancelToken, CaptureError, CaptureScope, OutputCapture, Stream};
pub use engine::python::PythonEngine;
pub use engine::{ScriptEngine, ScriptFault};
pub use executor::Executor;
pub use figure::{Figure, FigureError, Series};
pub use limits::{MonitorHandle, ResourceLimiter, ResourceLimits};
pub use timeout::{abandoned_workers, TimeoutController, WaitOutcome};
pub use types::{ExecutionId, ExecutionRequest, ExecutionResult};
