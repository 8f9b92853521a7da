//! # Tunnel Relay Broker
//!
//! The public rendezvous point. Terminates WebSocket connections from
//! agents and indexes them by identifier; terminates WebSocket connections
//! from operator proxies and, once authorized, opens a fresh substream on
//! the matching agent and splices the two byte directions together.
//!
//! ## Architecture
//!
//! ```text
//! Operator Proxy ──WS──► Broker ──WS──► Agent ──TCP──► Local Service
//! ```
//!
//! ## Modules
//!
//! - [`auth`]     — HTTP-layer bearer/loopback checks
//! - [`control`]  — token issuance and session listing
//! - [`handlers`] — WebSocket connection lifecycle for agents and operators
//! - [`state`]    — shared application state (registry + credential service)

mod auth;
pub mod control;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use state::AppState;

/// Configuration for running the broker.
#[derive(Debug, Clone)]
pub struct MasterArgs {
    pub listen: SocketAddr,
    pub secret: String,
}

/// Builds the broker's axum router: WebSocket ingress for agents and
/// operators, plus the two control endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agent/websocket-v1", get(handlers::agent_ws_handler))
        .route("/connect/websocket-v1", get(handlers::connect_ws_handler))
        .route("/token-v1", post(control::issue_token_handler))
        .route("/sessions-v1", get(control::list_sessions_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the broker until `shutdown` resolves, then gives in-flight
/// handlers a five-second grace period before returning.
pub async fn run(
    args: MasterArgs,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = AppState::new(args.secret.into_bytes());
    let app = router(state);

    info!(addr = %args.listen, "tunnel broker listening");
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::select! {
        res = server => { res?; }
        _ = shutdown => {
            info!("shutdown requested, giving in-flight handlers a grace period");
            tokio::time::sleep(tunnel_core::consts::BROKER_SHUTDOWN_GRACE).await;
        }
    }

    Ok(())
}
