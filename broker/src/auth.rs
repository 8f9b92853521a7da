//! HTTP-layer authorization checks shared by the control endpoints and the
//! operator WebSocket ingress. The actual signing/verification lives in
//! [`tunnel_core::auth`]; this module only extracts headers and turns a
//! failure into an HTTP response.

use std::net::SocketAddr;

use axum::http::{HeaderMap, StatusCode};
use tunnel_core::auth::token_from_header;
use tunnel_protocol::FORWARDED_FOR_HEADER;

use crate::state::AppState;

/// Requires a valid bearer token in `Authorization`. No scheme prefix is
/// expected; the header value is the token itself.
pub fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state
        .auth
        .validate(token_from_header(raw))
        .map(|_| ())
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

/// Requires the caller to be the broker host itself: a loopback peer
/// address with no reverse-proxy header present. Guards against a
/// forwarded request spoofing a loopback origin.
pub fn require_loopback(peer: SocketAddr, headers: &HeaderMap) -> Result<(), StatusCode> {
    if headers.contains_key(FORWARDED_FOR_HEADER) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if !peer.ip().is_loopback() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnel_core::auth::IssueOptions;

    const SECRET: &[u8] = b"auth-test-secret";

    fn loopback_peer() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn remote_peer() -> SocketAddr {
        "10.0.0.5:9000".parse().unwrap()
    }

    #[test]
    fn loopback_peer_with_no_forwarded_header_passes() {
        assert!(require_loopback(loopback_peer(), &HeaderMap::new()).is_ok());
    }

    #[test]
    fn loopback_peer_with_forwarded_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, "1.2.3.4".parse().unwrap());
        assert_eq!(
            require_loopback(loopback_peer(), &headers),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn non_loopback_peer_is_rejected() {
        assert_eq!(
            require_loopback(remote_peer(), &HeaderMap::new()),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn valid_bearer_token_passes() {
        let state = AppState::new(SECRET.to_vec());
        let token = state.auth.issue(IssueOptions::default()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, token.parse().unwrap());
        assert!(require_bearer(&state, &headers).is_ok());
    }

    #[test]
    fn invalid_bearer_token_is_rejected() {
        let state = AppState::new(SECRET.to_vec());
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "not-a-real-token".parse().unwrap());
        assert_eq!(require_bearer(&state, &headers), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn missing_authorization_header_is_rejected() {
        let state = AppState::new(SECRET.to_vec());
        assert_eq!(
            require_bearer(&state, &HeaderMap::new()),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
