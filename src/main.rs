use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use ragserve::core::{config, logging};
use ragserve::server;
use ragserve::state::{startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("Failed to load configuration")?;
    logging::init(&config.logging);

    tracing::info!("Server starting up: initializing shared components");
    let bind_addr = config.server.bind_addr();
    let state = AppState::initialize(config).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router(state.clone());
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    if let Err(err) = startup::warm_up(&state).await {
        tracing::error!("Startup failed: {}", err);
        server.abort();
        return Err(err.into());
    }

    state.readiness.mark_ready();
    tracing::info!("Shared components initialized successfully. Server is ready.");

    server
        .await
        .context("Server task failed")?
        .context("Server error")?;

    Ok(())
}
