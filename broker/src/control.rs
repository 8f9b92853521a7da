//! # Control Endpoints
//!
//! Two plain HTTP endpoints alongside the WebSocket ingress:
//! - `POST /token-v1` mints an operator bearer token, loopback callers only.
//! - `GET /sessions-v1` lists the live agent registry, bearer-authenticated.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tunnel_core::auth::IssueOptions;
use tunnel_protocol::{AgentSessionView, TokenResponse};

use crate::auth::{require_bearer, require_loopback};
use crate::state::AppState;

/// `POST /token-v1` — issues an operator token. Only reachable from the
/// broker host itself; any reverse-proxy header disqualifies the caller
/// regardless of the reported peer address.
pub async fn issue_token_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, StatusCode> {
    require_loopback(peer, &headers)?;
    let jwt = state
        .auth
        .issue(IssueOptions::default())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(TokenResponse { jwt }))
}

/// `GET /sessions-v1` — returns a snapshot of every live agent.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, AgentSessionView>>, StatusCode> {
    require_bearer(&state, &headers)?;
    let snapshot = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(id, meta)| {
            (
                id,
                AgentSessionView {
                    external_ip: meta.external_ip,
                    local_ips: meta.local_ips,
                },
            )
        })
        .collect();
    Ok(Json(snapshot))
}
