//! Resource budgets and best-effort memory containment
//!
//! Two enforcement paths exist. [`ResourceLimiter::configure`] installs a
//! hard address-space ceiling where the platform has one (Unix `RLIMIT_AS`).
//! Everywhere else, [`ResourceLimiter::monitor`] approximates enforcement by
//! sampling the process resident set on a cadence and terminating the whole
//! process when the budget is exceeded. There is no lighter-weight
//! interruption primitive, so the fallback is necessarily coarse.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resource limits for script execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum wall-clock execution time
    pub time_budget: Duration,

    /// Maximum process memory in bytes
    pub memory_budget_bytes: u64,

    /// Sampling cadence of the fallback memory monitor
    pub memory_poll_interval: Duration,

    /// Cap on each captured output stream, in bytes
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(30),
            memory_budget_bytes: 500 * 1024 * 1024, // 500 MB
            memory_poll_interval: Duration::from_millis(100),
            max_output_bytes: 1024 * 1024, // 1 MiB per stream
        }
    }
}

impl ResourceLimits {
    /// Strict limits for untrusted code
    pub fn strict() -> Self {
        Self {
            time_budget: Duration::from_secs(5),
            memory_budget_bytes: 50 * 1024 * 1024,
            memory_poll_interval: Duration::from_millis(50),
            max_output_bytes: 64 * 1024,
        }
    }

    /// Permissive limits for trusted code
    pub fn permissive() -> Self {
        Self {
            time_budget: Duration::from_secs(300),
            memory_budget_bytes: 2 * 1024 * 1024 * 1024,
            memory_poll_interval: Duration::from_millis(250),
            max_output_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Process-wide memory containment.
pub struct ResourceLimiter;

impl ResourceLimiter {
    /// Install a hard address-space ceiling on the current process.
    ///
    /// Returns `true` when the ceiling was installed. Only the soft limit is
    /// raised; the hard limit is preserved. On platforms without `RLIMIT_AS`
    /// this is a no-op returning `false` and the caller must rely on
    /// [`ResourceLimiter::monitor`] instead.
    ///
    /// Exceeding the ceiling makes allocation fail, and the Rust allocator
    /// aborts the process on failure: a hard backstop, not a recoverable
    /// path.
    pub fn configure(memory_budget_bytes: u64) -> bool {
        #[cfg(unix)]
        {
            install_address_space_ceiling(memory_budget_bytes)
        }
        #[cfg(not(unix))]
        {
            let _ = memory_budget_bytes;
            false
        }
    }

    /// Start the fallback polling monitor on a daemon thread.
    ///
    /// The monitor samples the process resident set every `poll_interval`
    /// and terminates the whole process (SIGTERM on Unix) once it exceeds
    /// `memory_budget_bytes`. The thread is never joined and will not block
    /// shutdown. The returned handle can cancel the monitor.
    pub fn monitor(memory_budget_bytes: u64, poll_interval: Duration) -> MonitorHandle {
        spawn_monitor(memory_budget_bytes, poll_interval, default_breach_action)
    }
}

#[cfg(unix)]
fn install_address_space_ceiling(bytes: u64) -> bool {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: plain libc calls on a valid pointer to a local struct.
    unsafe {
        if libc::getrlimit(libc::RLIMIT_AS, &mut current) != 0 {
            return false;
        }
        let ceiling = libc::rlimit {
            rlim_cur: bytes as libc::rlim_t,
            rlim_max: current.rlim_max,
        };
        libc::setrlimit(libc::RLIMIT_AS, &ceiling) == 0
    }
}

fn default_breach_action(budget: u64, observed: u64) {
    tracing::error!(
        budget_bytes = budget,
        observed_bytes = observed,
        "memory budget exceeded, terminating process"
    );
    #[cfg(unix)]
    // SAFETY: signalling our own pid.
    unsafe {
        libc::kill(libc::getpid(), libc::SIGTERM);
    }
    // Without a termination signal the breach is only logged; the monitor
    // loop stops either way.
}

/// Handle to a running memory monitor
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Ask the monitor to stop at its next sample
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn spawn_monitor<F>(budget: u64, interval: Duration, mut action: F) -> MonitorHandle
where
    F: FnMut(u64, u64) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    // Daemonic by construction: the join handle is dropped, never joined.
    let _ = thread::Builder::new()
        .name("pyground-mem-monitor".into())
        .spawn(move || {
            let mut system = System::new();
            let pid = Pid::from_u32(std::process::id());
            while !stop_flag.load(Ordering::SeqCst) {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                let observed = system.process(pid).map(|p| p.memory()).unwrap_or(0);
                if observed > budget {
                    action(budget, observed);
                    break;
                }
                thread::sleep(interval);
            }
        });

    MonitorHandle { stop }
}
