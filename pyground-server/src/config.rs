//! Environment-driven server configuration

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Wall-clock budget per execution
    pub max_execution_time: Duration,

    /// Process-wide memory budget in bytes
    pub max_memory_bytes: u64,

    /// Sampling cadence of the memory monitor
    pub memory_poll_interval: Duration,

    /// Directory for named scripts
    pub scripts_dir: PathBuf,
}

impl Config {
    /// Read configuration from the environment, with defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            max_execution_time: Duration::from_secs(parse_var("MAX_EXECUTION_TIME", 30)?),
            max_memory_bytes: parse_var("MAX_MEMORY_MB", 500)? * 1024 * 1024,
            memory_poll_interval: Duration::from_millis(parse_var("MEMORY_POLL_MS", 100)?),
            scripts_dir: PathBuf::from(
                env::var("SCRIPTS_DIR").unwrap_or_else(|_| "user_code".to_string()),
            ),
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
