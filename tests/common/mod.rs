//! Common test utilities shared across integration tests

use std::path::Path;
use std::time::Duration;

use pyground_server::config::Config;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Server configuration pointed at a temporary scripts directory
pub fn test_config(scripts_dir: &Path) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        max_execution_time: Duration::from_secs(10),
        max_memory_bytes: 500 * 1024 * 1024,
        memory_poll_interval: Duration::from_millis(100),
        scripts_dir: scripts_dir.to_path_buf(),
    }
}
