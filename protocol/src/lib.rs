//! Wire-level constants shared between the broker, the agent and the
//! operator proxy. Nothing in here is transport-specific; it is just the
//! vocabulary both ends need to agree on without importing each other.

/// Path the agent dials to register itself with the broker.
pub const AGENT_WS_PATH: &str = "/agent/websocket-v1";

/// Path the operator proxy dials to request a splice to a named agent.
pub const CONNECT_WS_PATH: &str = "/connect/websocket-v1";

/// Loopback-only endpoint that mints operator bearer tokens.
pub const TOKEN_PATH: &str = "/token-v1";

/// Authenticated endpoint that lists the live agent registry.
pub const SESSIONS_PATH: &str = "/sessions-v1";

/// Query parameter carrying the agent identifier on both WS endpoints.
pub const ID_QUERY_PARAM: &str = "id";

/// Header an agent sets with its comma-separated local interface addresses.
pub const LOCAL_IPS_HEADER: &str = "x-ips";

/// Standard reverse-proxy header consulted for the agent's external address
/// and to disqualify loopback trust on token issuance.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Default token lifetime, in seconds (24 hours).
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// JSON payload returned by [`TOKEN_PATH`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenResponse {
    pub jwt: String,
}

/// One entry of the [`SESSIONS_PATH`] response. Field names are part of the
/// wire contract and are intentionally not "corrected".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentSessionView {
    #[serde(rename = "ExternalIP")]
    pub external_ip: String,
    #[serde(rename = "InteralIPs")]
    pub local_ips: Vec<String>,
}
