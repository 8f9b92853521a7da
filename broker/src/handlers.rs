//! # WebSocket Handlers
//!
//! Contains the broker's two WebSocket entry points:
//! - [`agent_ws_handler`] registers an agent's multiplexed session.
//! - [`connect_ws_handler`] authenticates an operator, opens a substream on
//!   the requested agent, and splices the two together.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{error, info, warn};
use tunnel_core::mux::MuxSession;
use tunnel_core::registry::AgentMeta;
use tunnel_core::splice::splice;
use tunnel_core::ws_io::ServerWsIo;
use tunnel_protocol::{FORWARDED_FOR_HEADER, LOCAL_IPS_HEADER};
use yamux::Mode;

use crate::auth::require_bearer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: String,
}

// ─── Agent Ingress ──────────────────────────────────────────────

/// `GET /agent/websocket-v1?id=...` — an agent registers itself.
///
/// The identifier must be non-empty and not already live. Once upgraded,
/// the connection is kept open purely as the registration's liveness
/// signal; the broker never reads application data off it directly, only
/// substreams multiplexed on top.
pub async fn agent_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let id = query.id;
    if id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing id").into_response();
    }
    if state.registry.session(&id).is_ok() {
        return (StatusCode::CONFLICT, "agent id already registered").into_response();
    }

    let external_ip = external_ip(&headers, peer);
    let local_ips = local_ips(&headers);

    ws.on_upgrade(move |socket| async move {
        handle_agent_socket(state, id, external_ip, local_ips, socket).await;
    })
    .into_response()
}

async fn handle_agent_socket(
    state: AppState,
    id: String,
    external_ip: String,
    local_ips: Vec<String>,
    socket: axum::extract::ws::WebSocket,
) {
    let io = ServerWsIo::new(socket);
    let session = MuxSession::new(io, Mode::Server);

    let meta = AgentMeta { external_ip, local_ips };
    let session_id = session.id();
    if let Err(err) = state.registry.insert(id.clone(), session.clone(), meta) {
        warn!(agent = %id, session = %session_id, error = %err, "agent lost registration race");
        session.close().await;
        return;
    }
    info!(agent = %id, session = %session_id, "agent registered");

    // The multiplexer's close signal is the single source of truth for
    // this registration's liveness; no separate heartbeat is kept.
    session.closed().await;

    state.registry.remove(&id);
    info!(agent = %id, session = %session_id, "agent disconnected");
}

// ─── Operator Ingress / Splice Engine ───────────────────────────

/// `GET /connect/websocket-v1?id=...` — an operator proxy requests a
/// splice to a named agent.
///
/// State machine: INIT -> AUTHED -> UPGRADED -> OP_STREAM_OPEN ->
/// AGENT_STREAM_OPEN -> SPLICING -> DONE. Any failed transition releases
/// whatever was acquired and terminates.
pub async fn connect_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // AUTHED
    if let Err(status) = require_bearer(&state, &headers) {
        return status.into_response();
    }

    let id = query.id;
    ws.on_upgrade(move |socket| async move {
        handle_connect_socket(state, id, socket).await;
    })
    .into_response()
}

async fn handle_connect_socket(state: AppState, id: String, socket: axum::extract::ws::WebSocket) {
    // UPGRADED
    let io = ServerWsIo::new(socket);
    let operator_session = MuxSession::new(io, Mode::Server);
    let operator_session_id = operator_session.id();

    // OP_STREAM_OPEN
    let op_stream = match operator_session.accept().await {
        Ok(stream) => stream,
        Err(err) => {
            error!(agent = %id, session = %operator_session_id, error = %err, "failed to accept operator substream");
            operator_session.close().await;
            return;
        }
    };

    // Look up the agent. Missing here is an expected race (the agent may
    // disconnect between the operator's dial and this lookup), not an
    // internal error.
    let agent_session = match state.registry.session(&id) {
        Ok(session) => session,
        Err(err) => {
            info!(agent = %id, session = %operator_session_id, error = %err, "connect request for unknown agent");
            operator_session.close().await;
            return;
        }
    };

    // AGENT_STREAM_OPEN
    let agent_stream = match agent_session.open_stream().await {
        Ok(stream) => stream,
        Err(err) => {
            error!(agent = %id, session = %operator_session_id, error = %err, "failed to open agent substream");
            operator_session.close().await;
            return;
        }
    };

    // SPLICING
    info!(agent = %id, session = %operator_session_id, agent_session = %agent_session.id(), "splicing operator to agent");
    splice(op_stream.compat(), agent_stream.compat()).await;

    // DONE — the agent's own session is left registered for future
    // operators; only this operator's session is torn down.
    operator_session.close().await;
}

fn external_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

fn local_ips(headers: &HeaderMap) -> Vec<String> {
    headers
        .get(LOCAL_IPS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}
