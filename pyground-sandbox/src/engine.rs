//! Script engine seam
//!
//! The sandbox treats the script as an opaque unit evaluated by a
//! collaborator interpreter. Engines write every piece of observable output
//! through the capture sink ([`crate::capture::write_output`] and friends),
//! so the timing, memory, and capture contracts hold regardless of how
//! evaluation itself is performed.

pub mod python;

use thiserror::Error;

/// A collaborator interpreter that evaluates one script
pub trait ScriptEngine: Send + Sync {
    /// Evaluate the script to completion.
    ///
    /// Output goes through the capture sink; only failures originating in
    /// the script (or its cancellation) are returned.
    fn eval(&self, script: &str) -> Result<(), ScriptFault>;

    /// Engine name for logs
    fn name(&self) -> &str;

    /// Whether the engine observes the cancellation token at interruptible
    /// points. Selects the cooperative timeout strategy.
    fn interruptible(&self) -> bool {
        false
    }
}

/// A failure originating in the script itself
#[derive(Debug, Clone, Error)]
pub enum ScriptFault {
    /// The script did not parse
    #[error("SyntaxError: {message}")]
    Syntax { message: String, line: u32 },

    /// The script raised an uncaught exception
    #[error("{message}")]
    Runtime { message: String, trace: String },

    /// Evaluation was cut short by the execution's cancellation token
    #[error("execution cancelled")]
    Cancelled,
}

impl ScriptFault {
    /// Full diagnostic text as it appears on the captured error stream
    pub fn diagnostic(&self) -> String {
        match self {
            ScriptFault::Syntax { message, .. } => format!("SyntaxError: {message}\n"),
            ScriptFault::Runtime { trace, .. } => trace.clone(),
            // The timeout diagnostic is appended by the executor; a
            // cancelled script adds nothing of its own.
            ScriptFault::Cancelled => String::new(),
        }
    }
}
