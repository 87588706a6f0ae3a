pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

mod console;

use crate::core::{bootstrap, config::Settings, state::AppState, telemetry};

pub use crate::console::SessionArgs;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let backends = bootstrap::build_link_store(&settings).await?;
    let state = AppState::new(settings, backends.links.clone());

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        backend = state.links().backend_name(),
        "Examlink API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    backends.close().await;

    result?;

    Ok(())
}

/// Runs one test session against the configured link store from a terminal.
pub async fn run_session(args: SessionArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_console_tracing(&settings)?;

    let backends = bootstrap::build_link_store(&settings).await?;
    let result = console::take_test(&backends.links, args).await;

    backends.close().await;

    result
}
