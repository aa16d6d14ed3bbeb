//! Pyground server binary

use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpServer};
use tracing_subscriber::EnvFilter;

use pyground_sandbox::ResourceLimiter;
use pyground_server::build_state;
use pyground_server::config::Config;
use pyground_server::routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();
    tracing::info!(bind = %bind_addr, "starting pyground server");

    // Process-wide memory containment: a breach terminates the whole server,
    // which is the only enforcement available without per-script accounting.
    let _monitor = ResourceLimiter::monitor(config.max_memory_bytes, config.memory_poll_interval);

    let state = build_state(config)?;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "Content-Type"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS")),
            )
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
