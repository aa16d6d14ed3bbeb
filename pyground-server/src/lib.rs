//! Pyground server - HTTP edge for the sandboxed executor

pub mod config;
pub mod routes;
pub mod store;

use actix_web::web;
use std::sync::Arc;

use pyground_sandbox::{Executor, PythonEngine, ResourceLimits};

use crate::config::Config;
use crate::routes::AppState;
use crate::store::ScriptStore;

/// Build the shared application state from a configuration
pub fn build_state(config: Config) -> anyhow::Result<web::Data<AppState>> {
    let store = ScriptStore::new(&config.scripts_dir)?;
    let limits = ResourceLimits {
        time_budget: config.max_execution_time,
        memory_budget_bytes: config.max_memory_bytes,
        memory_poll_interval: config.memory_poll_interval,
        ..ResourceLimits::default()
    };
    let executor = Executor::with_limits(PythonEngine::new(), limits);
    Ok(web::Data::new(AppState {
        executor: Arc::new(executor),
        store,
        config,
    }))
}
