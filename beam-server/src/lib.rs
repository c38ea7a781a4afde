pub mod config;
pub mod room;
pub mod signaling;

pub use config::ServerConfig;
pub use room::{ClientConnection, RoomRegistry};
pub use signaling::ws_handler::{health, ws_handler};
pub use signaling::{
    ClientSession, Coordinator, Dispatch, JoinOutcome, LeaveOutcome, Membership, RelayOutcome,
};

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// WebSocket on `/` and `/ws`, plus `GET /health`. CORS is open so browser
/// clients served from another origin can connect.
pub fn router(coordinator: Coordinator) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(coordinator)
}

/// Serves on an already bound listener until the process is stopped.
pub async fn serve_on(listener: TcpListener, coordinator: Coordinator) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Signaling server listening on ws://{}", addr);

    axum::serve(listener, router(coordinator))
        .await
        .context("signaling server stopped")
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("failed to bind {}", config.addr()))?;

    let coordinator = Coordinator::new(Arc::new(RoomRegistry::new()));
    serve_on(listener, coordinator).await
}
