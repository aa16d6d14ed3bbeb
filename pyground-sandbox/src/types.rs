//! Core types for sandboxed script execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::limits::ResourceLimits;

/// Request to execute a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The script source to execute
    pub script: String,

    /// Wall-clock budget for the run
    pub time_budget: Duration,

    /// Memory budget in bytes. Enforcement is process-wide (see
    /// [`crate::ResourceLimiter`]); this records the budget the caller
    /// enforces alongside the run.
    pub memory_budget: u64,
}

impl ExecutionRequest {
    /// Create a request with the default budgets
    pub fn new(script: impl Into<String>) -> Self {
        let limits = ResourceLimits::default();
        Self {
            script: script.into(),
            time_budget: limits.time_budget,
            memory_budget: limits.memory_budget_bytes,
        }
    }

    /// Set the wall-clock budget
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Set the memory budget in bytes
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = bytes;
        self
    }
}

/// Terminal result of a script execution.
///
/// Always produced: script faults, timeouts, and worker failures are folded
/// into `stderr` rather than surfaced as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Captured standard output, in write order
    pub stdout: String,

    /// Captured standard error plus any synthetic diagnostics
    pub stderr: String,

    /// Base64-encoded PNG images, in emission order
    pub figures: Vec<String>,
}

impl ExecutionResult {
    /// Check if the run produced no diagnostics
    pub fn success(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// Unique execution identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
